//! Spherical Web-Mercator projection and slippy-map tile addressing.

use crate::config::TileLayerConfig;
use crate::records::GeoPosition;
use std::collections::HashMap;
use std::f64::consts::PI;

/// Side of the reference tile; world width at zoom `z` is `256 * 2^z`.
pub const BASE_TILE_SIZE: f64 = 256.0;
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_6;
/// Deepest zoom any provider serves; keeps tile indices within `u32`.
pub const MAX_TILE_ZOOM: u8 = 22;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

pub fn world_size(zoom: f64) -> f64 {
    BASE_TILE_SIZE * 2f64.powf(zoom)
}

/// Projects a position to world pixels at `zoom`.
pub fn project(position: GeoPosition, zoom: f64) -> WorldPoint {
    let size = world_size(zoom);
    let lat = position.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (position.longitude + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
    WorldPoint { x, y }
}

pub fn unproject(point: WorldPoint, zoom: f64) -> GeoPosition {
    let size = world_size(zoom);
    let longitude = point.x / size * 360.0 - 180.0;
    let n = PI - 2.0 * PI * point.y / size;
    let latitude = n.sinh().atan().to_degrees();
    GeoPosition::new(latitude, longitude)
}

/// Screen-space window onto the projected world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: GeoPosition,
    pub zoom: f64,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(center: GeoPosition, zoom: f64, width: f32, height: f32) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
        }
    }

    fn origin(&self) -> WorldPoint {
        let center = project(self.center, self.zoom);
        WorldPoint {
            x: center.x - f64::from(self.width) / 2.0,
            y: center.y - f64::from(self.height) / 2.0,
        }
    }

    pub fn to_screen(&self, position: GeoPosition) -> ScreenPoint {
        let origin = self.origin();
        let world = project(position, self.zoom);
        ScreenPoint {
            x: (world.x - origin.x) as f32,
            y: (world.y - origin.y) as f32,
        }
    }

    pub fn to_geo(&self, point: ScreenPoint) -> GeoPosition {
        let origin = self.origin();
        unproject(
            WorldPoint {
                x: origin.x + f64::from(point.x),
                y: origin.y + f64::from(point.y),
            },
            self.zoom,
        )
    }

}

/// Templated raster tile source.
#[derive(Debug, Clone)]
pub struct TileLayer {
    config: TileLayerConfig,
}

impl TileLayer {
    pub fn new(config: TileLayerConfig) -> Self {
        Self { config }
    }

    pub fn tile_size(&self) -> u32 {
        self.config.tile_size
    }

    /// Zoom level requested from the provider for a view zoom.
    pub fn tile_zoom(&self, view_zoom: f64) -> u8 {
        let requested = view_zoom.round() as i32 + i32::from(self.config.zoom_offset);
        let ceiling = self.config.max_zoom.min(MAX_TILE_ZOOM);
        requested.clamp(0, i32::from(ceiling)) as u8
    }

    pub fn tile_at(&self, position: GeoPosition, view_zoom: f64) -> TileCoord {
        let z = self.tile_zoom(view_zoom);
        let tile_world = f64::from(self.config.tile_size) * 2f64.powi(i32::from(z));
        let point = project(position, tile_world.log2() - BASE_TILE_SIZE.log2());
        let count = 1u32 << z;
        let tile = f64::from(self.config.tile_size);
        TileCoord {
            z,
            x: ((point.x / tile).floor() as u32).min(count - 1),
            y: ((point.y / tile).floor().max(0.0) as u32).min(count - 1),
        }
    }

    /// North-west corner of a tile.
    pub fn tile_corner(&self, tile: TileCoord) -> GeoPosition {
        let side = f64::from(self.config.tile_size);
        let tile_world = side * 2f64.powi(i32::from(tile.z));
        unproject(
            WorldPoint {
                x: f64::from(tile.x) * side,
                y: f64::from(tile.y) * side,
            },
            tile_world.log2() - BASE_TILE_SIZE.log2(),
        )
    }

    /// Tiles covering the viewport, row by row.
    pub fn visible_tiles(&self, viewport: &Viewport) -> Vec<TileCoord> {
        let corners = [
            ScreenPoint { x: 0.0, y: 0.0 },
            ScreenPoint {
                x: viewport.width,
                y: viewport.height,
            },
        ];
        let [top_left, bottom_right] =
            corners.map(|corner| self.tile_at(viewport.to_geo(corner), viewport.zoom));
        let mut tiles = Vec::new();
        for y in top_left.y..=bottom_right.y {
            for x in top_left.x..=bottom_right.x {
                tiles.push(TileCoord {
                    z: top_left.z,
                    x,
                    y,
                });
            }
        }
        tiles
    }

    pub fn url(&self, tile: TileCoord) -> String {
        let mut values: HashMap<&str, String> = HashMap::new();
        values.insert("id", self.config.style_id.clone());
        values.insert("z", tile.z.to_string());
        values.insert("x", tile.x.to_string());
        values.insert("y", tile.y.to_string());
        values.insert(
            "accessToken",
            self.config.access_token.clone().unwrap_or_default(),
        );
        values.insert("s", "a".to_string());
        values.insert("r", String::new());

        let mut url = self.config.url_template.clone();
        for (key, value) in &values {
            url = url.replace(&format!("{{{key}}}"), value);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn origin_projects_to_world_center() {
        let point = project(GeoPosition::new(0.0, 0.0), 0.0);
        assert!(approx(point.x, 128.0));
        assert!(approx(point.y, 128.0));
    }

    #[test]
    fn unproject_inverts_project() {
        let position = GeoPosition::new(48.8566, 2.3522);
        let back = unproject(project(position, 7.0), 7.0);
        assert!(approx(back.latitude, position.latitude));
        assert!(approx(back.longitude, position.longitude));
    }

    #[test]
    fn viewport_center_lands_mid_screen() {
        let viewport = Viewport::new(GeoPosition::new(21.1, 6.9), 4.0, 800.0, 600.0);
        let point = viewport.to_screen(viewport.center);
        assert!((point.x - 400.0).abs() < 1e-3);
        assert!((point.y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn tile_zoom_applies_offset_and_bounds() {
        let layer = TileLayer::new(TileLayerConfig::default());
        assert_eq!(layer.tile_zoom(4.0), 3);
        assert_eq!(layer.tile_zoom(0.0), 0);
        assert_eq!(layer.tile_zoom(25.0), 18);
    }

    #[test]
    fn tile_zoom_never_exceeds_provider_ceiling() {
        let config = TileLayerConfig {
            max_zoom: 40,
            ..TileLayerConfig::default()
        };
        let layer = TileLayer::new(config);
        assert_eq!(layer.tile_zoom(40.0), MAX_TILE_ZOOM);
        let tile = layer.tile_at(GeoPosition::new(21.1, 6.9), 40.0);
        assert_eq!(tile.z, MAX_TILE_ZOOM);
        assert!(tile.x < 1u32 << MAX_TILE_ZOOM);
    }

    #[test]
    fn tile_url_fills_template() {
        let config = TileLayerConfig {
            access_token: Some("pk.abc".into()),
            ..TileLayerConfig::default()
        };
        let layer = TileLayer::new(config);
        let url = layer.url(TileCoord { z: 3, x: 4, y: 3 });
        assert_eq!(
            url,
            "https://api.mapbox.com/styles/v1/mapbox/streets-v11/tiles/3/4/3?access_token=pk.abc"
        );
    }

    #[test]
    fn tile_corner_of_origin_tile_is_north_west() {
        let layer = TileLayer::new(TileLayerConfig::default());
        let corner = layer.tile_corner(TileCoord { z: 0, x: 0, y: 0 });
        assert!(approx(corner.longitude, -180.0));
        assert!(corner.latitude > 85.0);
    }

    #[test]
    fn visible_tiles_cover_the_center_tile() {
        let layer = TileLayer::new(TileLayerConfig::default());
        let viewport = Viewport::new(GeoPosition::new(21.1, 6.9), 4.0, 1024.0, 768.0);
        let center = layer.tile_at(viewport.center, viewport.zoom);
        let tiles = layer.visible_tiles(&viewport);
        assert!(tiles.contains(&center));
        assert!(tiles.iter().all(|t| t.z == 3));
    }
}
