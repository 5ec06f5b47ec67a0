use crate::{
    error::Error,
    pose::{Detection, JointKind, Point3, NUM_JOINTS},
};
use chrono::{Local, NaiveDateTime};
use serde::{ser::SerializeMap, Serialize, Serializer};
use tracing::warn;

/// Keypoint whose position stands in for the whole body.
const PROXY_KEYPOINT: usize = 1;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.6f";

/// Mirror-corrected joints of one body, in body format order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Joints(Vec<(JointKind, Point3)>);

impl Joints {
    pub(crate) fn from_keypoints(keypoints: &[Point3]) -> Result<Self, Error> {
        if keypoints.len() != NUM_JOINTS {
            return Err(Error::GetExpectedNumKeypoints(NUM_JOINTS, keypoints.len()));
        }

        keypoints
            .iter()
            .enumerate()
            .map(|(index, point)| Ok((JointKind::from_idx(index)?, point.mirrored())))
            .collect::<Result<Vec<_>, Error>>()
            .map(Self)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, kind: JointKind) -> Option<Point3> {
        self.0
            .iter()
            .find(|&&(k, _)| k == kind)
            .map(|&(_, point)| point)
    }
}

impl Serialize for Joints {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (kind, point) in &self.0 {
            map.serialize_entry(kind.name(), point)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BodySample {
    pub(crate) id: i32,
    pub(crate) date: String,
    pub(crate) time: String,
    pub(crate) joints: Joints,
    pub(crate) x: f32,
    pub(crate) y: f32,
}

/// Extract the joints of the first renderable body, stamped with the current local time.
///
/// Returns `None` when no detection has keypoints to extract.
pub(crate) fn extract(detections: &[Detection], tracking_enabled: bool) -> Option<BodySample> {
    extract_at(detections, tracking_enabled, Local::now().naive_local())
}

pub(crate) fn extract_at(
    detections: &[Detection],
    tracking_enabled: bool,
    now: NaiveDateTime,
) -> Option<BodySample> {
    detections
        .iter()
        .filter(|detection| detection.is_renderable(tracking_enabled))
        .filter(|detection| !detection.keypoints.is_empty())
        .find_map(|detection| {
            let joints = match Joints::from_keypoints(&detection.keypoints) {
                Ok(joints) => joints,
                Err(error) => {
                    warn!(message = "skipping malformed body", id = detection.id, %error);
                    return None;
                }
            };
            let proxy = detection.keypoints[PROXY_KEYPOINT].mirrored();

            Some(BodySample {
                id: detection.id,
                date: now.format(DATE_FORMAT).to_string(),
                time: now.format(TIME_FORMAT).to_string(),
                joints,
                x: proxy.x,
                y: proxy.z,
            })
        })
}
