use crate::{error::Error, pose::Detection};
use serde::Deserialize;

mod stream;

pub(crate) use stream::StreamCamera;

/// One captured frame and the bodies detected in it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Frame {
    #[serde(default)]
    pub(crate) timestamp_ns: u64,
    #[serde(default)]
    pub(crate) bodies: Vec<Detection>,
}

/// Parameters applied each time bodies are retrieved from a frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct RuntimeParams {
    /// Detections below this confidence, in the range 0 to 100, are discarded.
    pub(crate) detection_confidence_threshold: f32,
}

impl Default for RuntimeParams {
    fn default() -> Self {
        Self {
            detection_confidence_threshold: 40.0,
        }
    }
}

impl Frame {
    pub(crate) fn retrieve_bodies(self, params: &RuntimeParams) -> Vec<Detection> {
        let mut bodies = self.bodies;
        bodies.retain(|body| body.confidence >= params.detection_confidence_threshold);
        bodies
    }
}

pub(crate) trait Camera {
    /// Block until the next frame is available.
    ///
    /// Returns `Ok(None)` once the source is exhausted. An error means this
    /// grab failed; later grabs may still succeed.
    fn grab(&mut self) -> Result<Option<Frame>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::TrackingState;

    fn body(id: i32, confidence: f32) -> Detection {
        Detection {
            id,
            tracking_state: TrackingState::Ok,
            confidence,
            keypoints: vec![],
        }
    }

    #[test]
    fn retrieve_drops_low_confidence() {
        let frame = Frame {
            timestamp_ns: 0,
            bodies: vec![body(0, 12.0), body(1, 40.0), body(2, 95.5)],
        };
        let ids = frame
            .retrieve_bodies(&RuntimeParams::default())
            .into_iter()
            .map(|body| body.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn zero_threshold_keeps_everything() {
        let frame = Frame {
            timestamp_ns: 0,
            bodies: vec![body(0, 0.0), body(1, 1.0)],
        };
        let params = RuntimeParams {
            detection_confidence_threshold: 0.0,
        };
        assert_eq!(frame.retrieve_bodies(&params).len(), 2);
    }
}
