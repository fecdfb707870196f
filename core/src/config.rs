//! Start-up configuration: endpoint, channel, tile layer and initial view.

use crate::prelude::{SyncError, SyncResult};
use crate::records::GeoPosition;
use crate::render::projection::MAX_TILE_ZOOM;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Endpoint returning the full JSON array of point records.
    pub endpoint_url: String,
    pub request_timeout_ms: u64,
    pub channel: ChannelConfig,
    pub tiles: TileLayerConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub url: String,
    pub reconnect_delay_ms: u64,
    /// `None` keeps reconnecting forever.
    pub max_reconnect_attempts: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLayerConfig {
    pub url_template: String,
    pub style_id: String,
    pub access_token: Option<String>,
    pub max_zoom: u8,
    pub tile_size: u32,
    pub zoom_offset: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub center: GeoPosition,
    pub zoom: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:3000/".into(),
            request_timeout_ms: 10_000,
            channel: ChannelConfig::default(),
            tiles: TileLayerConfig::default(),
            view: ViewConfig::default(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3030".into(),
            reconnect_delay_ms: 1_000,
            max_reconnect_attempts: None,
        }
    }
}

impl Default for TileLayerConfig {
    fn default() -> Self {
        Self {
            url_template:
                "https://api.mapbox.com/styles/v1/{id}/tiles/{z}/{x}/{y}?access_token={accessToken}"
                    .into(),
            style_id: "mapbox/streets-v11".into(),
            access_token: None,
            max_zoom: 18,
            tile_size: 512,
            zoom_offset: -1,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            center: GeoPosition::new(21.1, 6.9),
            zoom: 4,
        }
    }
}

impl MonitorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            SyncError::Config(format!("reading {}: {err}", path_ref.display()))
        })?;
        Self::from_yaml_str(&contents)
            .map_err(|err| SyncError::Config(format!("{}: {err}", path_ref.display())))
    }

    pub fn from_yaml_str(contents: &str) -> SyncResult<Self> {
        let config: MonitorConfig = serde_yaml::from_str(contents)
            .map_err(|err| SyncError::Config(format!("parsing yaml: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SyncResult<()> {
        require_scheme("endpoint_url", &self.endpoint_url, &["http://", "https://"])?;
        require_scheme("channel.url", &self.channel.url, &["ws://", "wss://"])?;
        if self.tiles.url_template.trim().is_empty() {
            return Err(SyncError::Config("tiles.url_template is empty".into()));
        }
        if self.tiles.tile_size == 0 {
            return Err(SyncError::Config("tiles.tile_size must be positive".into()));
        }
        let zooms = [
            ("tiles.max_zoom", self.tiles.max_zoom),
            ("view.zoom", self.view.zoom),
        ];
        for (field, zoom) in zooms {
            if zoom > MAX_TILE_ZOOM {
                return Err(SyncError::Config(format!("{field} {zoom} above {MAX_TILE_ZOOM}")));
            }
        }
        self.view
            .center
            .validate()
            .map_err(|err| SyncError::Config(format!("view.center: {err}")))?;
        Ok(())
    }
}

fn require_scheme(field: &str, value: &str, schemes: &[&str]) -> SyncResult<()> {
    if value.trim().is_empty() {
        return Err(SyncError::Config(format!("{field} is empty")));
    }
    if !schemes.iter().any(|scheme| value.starts_with(scheme)) {
        return Err(SyncError::Config(format!(
            "{field} `{value}` must start with one of {}",
            schemes.join(", ")
        )));
    }
    Ok(())
}
