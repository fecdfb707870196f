use crate::records::{LiveDetector, PointRecord};

/// View state: the point collection, the live detector slot and the channel
/// connection flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionStore {
    points: Vec<PointRecord>,
    detector: Option<LiveDetector>,
    connected: bool,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[PointRecord] {
        &self.points
    }

    pub fn detector(&self) -> Option<&LiveDetector> {
        self.detector.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Replaces the whole collection with `points`, keeping their order.
    pub fn replace_points(&mut self, points: Vec<PointRecord>) {
        self.points = points;
    }

    pub fn set_detector(&mut self, detector: LiveDetector) {
        self.detector = Some(detector);
    }

    /// Returns `true` when the flag changed.
    pub fn set_connected(&mut self, connected: bool) -> bool {
        let changed = self.connected != connected;
        self.connected = connected;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::GeoPosition;

    #[test]
    fn replace_points_discards_previous_collection() {
        let mut store = PositionStore::new();
        store.replace_points(vec![PointRecord::new("a", 1.0, 1.0), PointRecord::new("b", 2.0, 2.0)]);
        store.replace_points(vec![PointRecord::new("c", 3.0, 3.0)]);
        assert_eq!(store.points().len(), 1);
        assert_eq!(store.points()[0].id, "c");
    }

    #[test]
    fn detector_slot_holds_the_latest_update() {
        let mut store = PositionStore::new();
        store.set_detector(LiveDetector::new("d1", GeoPosition::new(1.0, 1.0)));
        store.set_detector(LiveDetector::new("d1", GeoPosition::new(5.0, 6.0)));
        assert_eq!(
            store.detector().unwrap().current_position,
            GeoPosition::new(5.0, 6.0)
        );
    }

    #[test]
    fn set_connected_reports_changes_only() {
        let mut store = PositionStore::new();
        assert!(!store.set_connected(false));
        assert!(store.set_connected(true));
        assert!(store.is_connected());
    }
}
