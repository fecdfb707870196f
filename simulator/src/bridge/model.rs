use potholecore::records::{LiveDetector, PointRecord};
use serde::{Deserialize, Serialize};

/// State served by the feed: the endpoint collection and the last detector fix.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FeedSnapshot {
    pub points: Vec<PointRecord>,
    pub detector: Option<LiveDetector>,
}

impl FeedSnapshot {
    pub fn new(points: Vec<PointRecord>) -> Self {
        Self {
            points,
            detector: None,
        }
    }
}
