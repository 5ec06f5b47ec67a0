use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("failed to open camera source: {1:?}")]
    OpenCamera(#[source] std::io::Error, PathBuf),

    #[error("failed to read frame from camera source")]
    ReadFrame(#[source] std::io::Error),

    #[error("failed to decode frame on line {1}")]
    DecodeFrame(#[source] serde_json::Error, usize),

    #[error("expected {0} keypoints, got {1}")]
    GetExpectedNumKeypoints(usize, usize),

    #[error("failed to convert usize value to joint kind: {0}")]
    ConvertUSizeToJointKind(usize),

    #[error("failed to convert value to f64")]
    ConvertToF64,

    #[error("failed to create output file: {1:?}")]
    CreateOutput(#[source] std::io::Error, PathBuf),

    #[error("failed to serialize sample log")]
    SerializeSampleLog(#[source] serde_json::Error),

    #[error("failed to flush output file")]
    FlushOutput(#[source] std::io::Error),
}
