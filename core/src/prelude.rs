pub use crate::channel::{ChannelEvent, PushChannel, Signal};
pub use crate::records::{GeoPosition, LiveDetector, PointRecord};
pub use crate::store::PositionStore;

/// Common error type for decoding, transport and configuration failures.
///
/// Variants carry rendered messages so the error can travel through UI
/// messages, which must be `Clone`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("malformed payload: {0}")]
    Decode(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("endpoint responded with status {0}")]
    Status(u16),
    #[error("channel failure: {0}")]
    Channel(String),
    #[error("unsupported packet: {0}")]
    Unsupported(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
