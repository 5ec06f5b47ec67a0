use crate::error::Error;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Joints of the 34 keypoint body format, in the order the camera reports them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_derive::FromPrimitive)]
pub(crate) enum JointKind {
    Pelvis,
    NavalSpine,
    ChestSpine,
    Neck,
    ClavicleLeft,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    HandTipLeft,
    ThumbLeft,
    ClavicleRight,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HandTipRight,
    ThumbRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
    Head,
    Nose,
    EyeLeft,
    EarLeft,
    EyeRight,
    EarRight,
    HeelLeft,
    HeelRight,
}

pub(crate) const NUM_JOINTS: usize = 34;

impl JointKind {
    pub(crate) fn from_idx(index: usize) -> Result<Self, Error> {
        Self::from_usize(index).ok_or(Error::ConvertUSizeToJointKind(index))
    }

    /// Label used for this joint in exported records.
    pub(crate) fn name(self) -> &'static str {
        use JointKind::*;

        match self {
            Pelvis => "Pelvis",
            NavalSpine => "NavalSpine",
            ChestSpine => "ChestSpine",
            Neck => "Neck",
            ClavicleLeft => "ClavicleLeft",
            ShoulderLeft => "ShoulderLeft",
            ElbowLeft => "ElbowLeft",
            WristLeft => "WristLeft",
            HandLeft => "HandLeft",
            HandTipLeft => "HandTipLeft",
            ThumbLeft => "ThumbLeft",
            ClavicleRight => "ClavicleRight",
            ShoulderRight => "ShoulderRight",
            ElbowRight => "ElbowRight",
            WristRight => "WristRight",
            HandRight => "HandRight",
            HandTipRight => "HandTipRight",
            ThumbRight => "ThumbRight",
            HipLeft => "HipLeft",
            KneeLeft => "KneeLeft",
            AnkleLeft => "AnkleLeft",
            FootLeft => "FootLeft",
            HipRight => "HipRight",
            KneeRight => "KneeRight",
            AnkleRight => "AnkleRight",
            FootRight => "FootRight",
            Head => "Head",
            Nose => "Nose",
            EyeLeft => "EyeLeft",
            EarLeft => "EarLeft",
            EyeRight => "EyeRight",
            EarRight => "EarRight",
            HeelLeft => "HeelLeft",
            HeelRight => "HeelRight",
        }
    }
}

/// A 3D keypoint, serialized as `[x, y, z]`.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub(crate) struct Point3 {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) z: f32,
}

impl Point3 {
    pub(crate) fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The camera image is mirrored along its first axis.
    pub(crate) fn mirrored(self) -> Self {
        Self { x: -self.x, ..self }
    }
}

impl From<[f32; 3]> for Point3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Point3> for [f32; 3] {
    fn from(Point3 { x, y, z }: Point3) -> Self {
        [x, y, z]
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TrackingState {
    Off,
    Ok,
    Searching,
    Terminate,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self::Off
    }
}

pub(crate) const NOT_TRACKED: i32 = -1;

fn default_id() -> i32 {
    NOT_TRACKED
}

fn default_confidence() -> f32 {
    100.0
}

/// One tracked body in one frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Detection {
    #[serde(default = "default_id")]
    pub(crate) id: i32,
    #[serde(default)]
    pub(crate) tracking_state: TrackingState,
    #[serde(default = "default_confidence")]
    pub(crate) confidence: f32,
    #[serde(default)]
    pub(crate) keypoints: Vec<Point3>,
}

impl Detection {
    /// Whether the body should be drawn, and therefore recorded, this frame.
    pub(crate) fn is_renderable(&self, tracking_enabled: bool) -> bool {
        if tracking_enabled {
            self.tracking_state == TrackingState::Ok
        } else {
            !self.keypoints.is_empty()
        }
    }
}
