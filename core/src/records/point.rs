use crate::prelude::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Rejects non-finite or out-of-range coordinates.
    pub fn validate(&self) -> SyncResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(SyncError::Decode(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(SyncError::Decode(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// Static geolocated item served by the endpoint and rendered as a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl PointRecord {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            image: None,
        }
    }

    pub fn position(&self) -> GeoPosition {
        GeoPosition::new(self.latitude, self.longitude)
    }

    /// Decodes a single record. Only the JSON shape is checked.
    pub fn from_json(raw: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Decodes the endpoint body: a JSON array of records, kept verbatim.
    pub fn collection_from_slice(body: &[u8]) -> SyncResult<Vec<Self>> {
        Ok(serde_json::from_slice(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_record_reads_endpoint_field_names() {
        let record =
            PointRecord::from_json(r#"{"_id":"p1","latitude":48.85,"longitude":2.35,"image":"a.jpg"}"#)
                .unwrap();
        assert_eq!(record.id, "p1");
        assert_eq!(record.image.as_deref(), Some("a.jpg"));
        assert_eq!(record.position(), GeoPosition::new(48.85, 2.35));
    }

    #[test]
    fn position_validate_flags_out_of_range_latitude() {
        let record = PointRecord::new("p1", 91.0, 0.0);
        assert!(matches!(record.position().validate(), Err(SyncError::Decode(_))));
    }

    #[test]
    fn point_record_rejects_wrong_coordinate_type() {
        let err = PointRecord::from_json(r#"{"_id":"p1","latitude":"north","longitude":0.0}"#)
            .unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
    }

    #[test]
    fn point_record_rejects_missing_coordinates() {
        assert!(PointRecord::from_json(r#"{"_id":"p1","latitude":1.0}"#).is_err());
    }

    #[test]
    fn collection_decodes_array_in_order() {
        let body = br#"[{"_id":"a","latitude":1,"longitude":2},{"_id":"b","latitude":3,"longitude":4}]"#;
        let records = PointRecord::collection_from_slice(body).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn collection_keeps_records_verbatim() {
        let body = br#"[{"_id":"a","latitude":1,"longitude":2},{"_id":"","latitude":90.5,"longitude":4}]"#;
        let records = PointRecord::collection_from_slice(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "");
        assert_eq!(records[1].latitude, 90.5);
    }

    #[test]
    fn collection_rejects_non_array_body() {
        assert!(PointRecord::collection_from_slice(br#"{"_id":"a"}"#).is_err());
    }
}
