//! Pure mapping from the position store to a marker scene.

pub mod projection;

pub use projection::{ScreenPoint, TileCoord, TileLayer, Viewport, WorldPoint};

use crate::records::GeoPosition;
use crate::store::PositionStore;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkerKind {
    Pothole,
    Detector,
}

/// Marker icon description, in pixels relative to the icon's top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IconSpec {
    pub icon_url: String,
    pub shadow_url: Option<String>,
    pub size: [u32; 2],
    pub anchor: [i32; 2],
    pub popup_anchor: [i32; 2],
    pub shadow_size: Option<[u32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerStyles {
    pub pothole: IconSpec,
    pub detector: IconSpec,
}

const MARKER_SHADOW: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/leaflet/0.7.7/images/marker-shadow.png";

impl Default for MarkerStyles {
    fn default() -> Self {
        Self {
            pothole: IconSpec {
                icon_url: "https://cdn-icons-png.flaticon.com/512/2457/2457481.png".into(),
                shadow_url: Some(MARKER_SHADOW.into()),
                size: [25, 30],
                anchor: [12, 41],
                popup_anchor: [1, -34],
                shadow_size: Some([34, 34]),
            },
            detector: IconSpec {
                icon_url: "https://raw.githubusercontent.com/pointhi/leaflet-color-markers/master/img/marker-icon-2x-blue.png".into(),
                shadow_url: Some(MARKER_SHADOW.into()),
                size: [25, 41],
                anchor: [12, 41],
                popup_anchor: [1, -34],
                shadow_size: Some([41, 41]),
            },
        }
    }
}

impl MarkerStyles {
    pub fn icon(&self, kind: MarkerKind) -> &IconSpec {
        match kind {
            MarkerKind::Pothole => &self.pothole,
            MarkerKind::Detector => &self.detector,
        }
    }
}

/// Coordinate popup attached to every marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Popup {
    pub latitude: f64,
    pub longitude: f64,
}

impl Popup {
    pub fn lines(&self) -> [String; 2] {
        [
            format!("Latitude : {}", self.latitude),
            format!("Longitude : {}", self.longitude),
        ]
    }
}

impl fmt::Display for Popup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [latitude, longitude] = self.lines();
        write!(f, "{latitude}\n{longitude}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub key: String,
    pub kind: MarkerKind,
    pub position: GeoPosition,
    pub icon: IconSpec,
    pub popup: Popup,
}

impl Marker {
    fn new(key: &str, kind: MarkerKind, position: GeoPosition, styles: &MarkerStyles) -> Self {
        Self {
            key: key.to_string(),
            kind,
            position,
            icon: styles.icon(kind).clone(),
            popup: Popup {
                latitude: position.latitude,
                longitude: position.longitude,
            },
        }
    }
}

/// Everything the map surface draws, in draw order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapScene {
    pub markers: Vec<Marker>,
}

impl MapScene {
    pub fn count(&self, kind: MarkerKind) -> usize {
        self.markers.iter().filter(|m| m.kind == kind).count()
    }

    pub fn detector(&self) -> Option<&Marker> {
        self.markers.iter().find(|m| m.kind == MarkerKind::Detector)
    }
}

/// One marker per point record, then the detector marker when present.
pub fn render_scene(store: &PositionStore, styles: &MarkerStyles) -> MapScene {
    let mut markers = Vec::with_capacity(store.points().len() + 1);
    markers.extend(
        store
            .points()
            .iter()
            .map(|point| Marker::new(&point.id, MarkerKind::Pothole, point.position(), styles)),
    );
    if let Some(detector) = store.detector() {
        markers.push(Marker::new(
            &detector.id,
            MarkerKind::Detector,
            detector.current_position,
            styles,
        ));
    }
    MapScene { markers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{LiveDetector, PointRecord};

    fn store_with(points: usize, detector: bool) -> PositionStore {
        let mut store = PositionStore::new();
        store.replace_points(
            (0..points)
                .map(|i| PointRecord::new(format!("p{i}"), i as f64, -(i as f64)))
                .collect(),
        );
        if detector {
            store.set_detector(LiveDetector::new("d1", GeoPosition::new(1.0, 2.0)));
        }
        store
    }

    #[test]
    fn marker_count_matches_point_count() {
        for count in [0, 1, 7, 250] {
            let scene = render_scene(&store_with(count, false), &MarkerStyles::default());
            assert_eq!(scene.markers.len(), count);
            assert_eq!(scene.count(MarkerKind::Pothole), count);
        }
    }

    #[test]
    fn detector_adds_a_distinct_marker() {
        let styles = MarkerStyles::default();
        let scene = render_scene(&store_with(3, true), &styles);
        assert_eq!(scene.markers.len(), 4);
        let detector = scene.detector().unwrap();
        assert_eq!(detector.position, GeoPosition::new(1.0, 2.0));
        assert_eq!(detector.icon, styles.detector);
        assert_ne!(detector.icon.icon_url, scene.markers[0].icon.icon_url);
    }

    #[test]
    fn popup_shows_both_coordinates() {
        let scene = render_scene(&store_with(0, true), &MarkerStyles::default());
        let popup = scene.detector().unwrap().popup;
        assert_eq!(popup.to_string(), "Latitude : 1\nLongitude : 2");
    }

    #[test]
    fn markers_are_keyed_by_record_id_in_order() {
        let scene = render_scene(&store_with(3, false), &MarkerStyles::default());
        let keys: Vec<_> = scene.markers.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["p0", "p1", "p2"]);
    }
}
