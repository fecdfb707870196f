use super::point::GeoPosition;
use crate::prelude::SyncResult;
use serde::{Deserialize, Serialize};

/// Mobile survey unit whose position arrives over the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDetector {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub current_position: GeoPosition,
}

impl LiveDetector {
    pub fn new(id: impl Into<String>, position: GeoPosition) -> Self {
        Self {
            id: id.into(),
            name: None,
            current_position: position,
        }
    }

    pub fn from_json(raw: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
