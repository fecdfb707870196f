use crate::prelude::{SyncError, SyncResult};
use crate::records::{LiveDetector, PointRecord};
use serde::{Deserialize, Serialize};

/// Wire form of a `"message"` event: `{"messageType": .., "message": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEnvelope {
    pub message_type: String,
    pub message: String,
}

/// Known values of `messageType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    SimpleText,
    PotholePosition,
    DetectorPosition,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::SimpleText => "simple text",
            MessageKind::PotholePosition => "pothole position",
            MessageKind::DetectorPosition => "detector position",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "simple text" => Some(MessageKind::SimpleText),
            "pothole position" => Some(MessageKind::PotholePosition),
            "detector position" => Some(MessageKind::DetectorPosition),
            _ => None,
        }
    }
}

/// Decoded notification.
#[derive(Debug, Clone, PartialEq)]
pub enum PushNotice {
    SimpleText(String),
    /// The record is a hint only; a pothole notice always asks for a refresh,
    /// so an undecodable inner record is carried as the error.
    PotholePosition(SyncResult<PointRecord>),
    DetectorPosition(LiveDetector),
    Unknown { message_type: String, raw: String },
}

impl PushEnvelope {
    pub fn new(kind: MessageKind, message: impl Into<String>) -> Self {
        Self {
            message_type: kind.as_str().to_string(),
            message: message.into(),
        }
    }

    pub fn simple_text(text: impl Into<String>) -> Self {
        Self::new(MessageKind::SimpleText, text)
    }

    pub fn pothole(record: &PointRecord) -> SyncResult<Self> {
        Ok(Self::new(
            MessageKind::PotholePosition,
            serde_json::to_string(record)?,
        ))
    }

    pub fn detector(detector: &LiveDetector) -> SyncResult<Self> {
        Ok(Self::new(
            MessageKind::DetectorPosition,
            serde_json::to_string(detector)?,
        ))
    }

    pub fn from_json(raw: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::parse(&self.message_type)
    }

    /// Decodes the nested payload according to `messageType`.
    ///
    /// Fails only when a detector payload does not match its shape.
    pub fn into_notice(self, raw: &str) -> SyncResult<PushNotice> {
        match self.kind() {
            Some(MessageKind::SimpleText) => Ok(PushNotice::SimpleText(self.message)),
            Some(MessageKind::PotholePosition) => Ok(PushNotice::PotholePosition(
                PointRecord::from_json(&self.message),
            )),
            Some(MessageKind::DetectorPosition) => Ok(PushNotice::DetectorPosition(
                LiveDetector::from_json(&self.message)?,
            )),
            None => Ok(PushNotice::Unknown {
                message_type: self.message_type,
                raw: raw.to_string(),
            }),
        }
    }
}

/// Decodes the raw text of a `"message"` event into a notice.
pub fn decode_notice(raw: &str) -> SyncResult<PushNotice> {
    let envelope = PushEnvelope::from_json(raw)
        .map_err(|err| SyncError::Decode(format!("envelope: {err}")))?;
    envelope.into_notice(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::GeoPosition;

    #[test]
    fn decodes_detector_notice() {
        let raw = r#"{"messageType":"detector position","message":"{\"_id\":\"d1\",\"currentPosition\":{\"latitude\":1,\"longitude\":2}}"}"#;
        match decode_notice(raw).unwrap() {
            PushNotice::DetectorPosition(detector) => {
                assert_eq!(detector.current_position, GeoPosition::new(1.0, 2.0));
            }
            other => panic!("unexpected notice {other:?}"),
        }
    }

    #[test]
    fn pothole_notice_keeps_bad_inner_record_as_error() {
        let raw = r#"{"messageType":"pothole position","message":"not json"}"#;
        match decode_notice(raw).unwrap() {
            PushNotice::PotholePosition(Err(SyncError::Decode(_))) => {}
            other => panic!("unexpected notice {other:?}"),
        }
    }

    #[test]
    fn unknown_type_keeps_raw_text() {
        let raw = r#"{"messageType":"battery level","message":"42"}"#;
        match decode_notice(raw).unwrap() {
            PushNotice::Unknown { message_type, raw: kept } => {
                assert_eq!(message_type, "battery level");
                assert_eq!(kept, raw);
            }
            other => panic!("unexpected notice {other:?}"),
        }
    }

    #[test]
    fn malformed_envelope_fails_closed() {
        assert!(decode_notice("{").is_err());
        assert!(decode_notice(r#"{"messageType":"simple text"}"#).is_err());
    }

    #[test]
    fn built_envelopes_decode_back_to_their_kind() {
        let record = PointRecord::new("p9", 45.0, 7.5);
        let json = PushEnvelope::pothole(&record).unwrap().to_json().unwrap();
        assert!(matches!(
            decode_notice(&json).unwrap(),
            PushNotice::PotholePosition(Ok(ref decoded)) if decoded == &record
        ));
    }
}
