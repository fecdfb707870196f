use iced::{
    mouse,
    widget::canvas::{self, Event, Frame, Geometry, Path, Stroke, Text},
    Color, Pixels, Point, Rectangle, Renderer, Size, Theme,
};
use potholecore::records::GeoPosition;
use potholecore::render::{MapScene, Marker, MarkerKind, ScreenPoint, TileLayer, Viewport};

/// Cursor distance, in pixels, that opens a marker popup.
const HOVER_RADIUS: f32 = 10.0;
const GRATICULE_STEP_DEG: f64 = 10.0;

/// Canvas program drawing the map surface, markers and the hovered popup.
#[derive(Clone)]
pub struct MapCanvas {
    scene: MapScene,
    center: GeoPosition,
    zoom: f64,
    tiles: TileLayer,
}

impl MapCanvas {
    pub fn new(scene: MapScene, center: GeoPosition, zoom: f64, tiles: TileLayer) -> Self {
        Self {
            scene,
            center,
            zoom,
            tiles,
        }
    }

    fn viewport(&self, size: Size) -> Viewport {
        Viewport::new(self.center, self.zoom, size.width, size.height)
    }
}

/// Marker whose anchor is closest to `cursor`, within the hover radius.
/// Later markers win ties so the detector, drawn last, stays on top.
pub fn hovered_marker<'a>(
    scene: &'a MapScene,
    viewport: &Viewport,
    cursor: Point,
) -> Option<&'a Marker> {
    let mut best: Option<(&Marker, f32)> = None;
    for marker in &scene.markers {
        let at = viewport.to_screen(marker.position);
        let distance = ((at.x - cursor.x).powi(2) + (at.y - cursor.y).powi(2)).sqrt();
        if distance <= HOVER_RADIUS && best.map_or(true, |(_, d)| distance <= d) {
            best = Some((marker, distance));
        }
    }
    best.map(|(marker, _)| marker)
}

fn marker_color(kind: MarkerKind) -> Color {
    match kind {
        MarkerKind::Pothole => Color::from_rgb(0.95, 0.55, 0.2),
        MarkerKind::Detector => Color::from_rgb(0.18, 0.45, 0.95),
    }
}

fn to_point(point: ScreenPoint) -> Point {
    Point::new(point.x, point.y)
}

impl<Message> canvas::Program<Message> for MapCanvas {
    type State = ();

    fn update(
        &self,
        _state: &mut Self::State,
        event: &Event,
        _bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Option<canvas::Action<Message>> {
        match event {
            Event::Mouse(mouse::Event::CursorMoved { .. }) => Some(canvas::Action::request_redraw()),
            _ => None,
        }
    }

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        let viewport = self.viewport(bounds.size());
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.05, 0.07, 0.1),
        );

        // Tile grid of the configured provider, drawn as the map surface.
        let tile_px = self.tiles.tile_size() as f32;
        for tile in self.tiles.visible_tiles(&viewport) {
            let top_left = viewport.to_screen(self.tiles.tile_corner(tile));
            let outline = Path::rectangle(to_point(top_left), Size::new(tile_px, tile_px));
            frame.fill(&outline, Color::from_rgb(0.08, 0.1, 0.14));
            frame.stroke(
                &outline,
                Stroke::default()
                    .with_width(1.0)
                    .with_color(Color::from_rgb(0.16, 0.2, 0.26)),
            );
        }

        let graticule = Path::new(|builder| {
            let mut lat = -80.0;
            while lat <= 80.0 {
                let west = viewport.to_screen(GeoPosition::new(lat, -180.0));
                let east = viewport.to_screen(GeoPosition::new(lat, 180.0));
                builder.move_to(to_point(west));
                builder.line_to(to_point(east));
                lat += GRATICULE_STEP_DEG;
            }
            let mut lon = -180.0;
            while lon <= 180.0 {
                let north = viewport.to_screen(GeoPosition::new(85.0, lon));
                let south = viewport.to_screen(GeoPosition::new(-85.0, lon));
                builder.move_to(to_point(north));
                builder.line_to(to_point(south));
                lon += GRATICULE_STEP_DEG;
            }
        });
        frame.stroke(
            &graticule,
            Stroke::default()
                .with_width(1.0)
                .with_color(Color::from_rgba(0.5, 0.6, 0.7, 0.25)),
        );

        for marker in &self.scene.markers {
            let at = to_point(viewport.to_screen(marker.position));
            let radius = marker.icon.size[0] as f32 / 4.0;
            let color = marker_color(marker.kind);
            let stem = Path::new(|builder| {
                builder.move_to(at);
                builder.line_to(Point::new(at.x, at.y - radius * 2.0));
            });
            frame.stroke(&stem, Stroke::default().with_width(2.0).with_color(color));
            let head = Path::circle(Point::new(at.x, at.y - radius * 2.0), radius);
            frame.fill(&head, color);
            frame.stroke(
                &head,
                Stroke::default()
                    .with_width(1.0)
                    .with_color(Color::from_rgb(0.02, 0.02, 0.04)),
            );
        }

        if let Some(position) = cursor.position_in(bounds) {
            if let Some(marker) = hovered_marker(&self.scene, &viewport, position) {
                let at = to_point(viewport.to_screen(marker.position));
                let [dx, dy] = marker.icon.popup_anchor;
                let origin = Point::new(at.x + dx as f32 - 70.0, at.y + dy as f32 - 44.0);
                let panel = Path::rectangle(origin, Size::new(150.0, 40.0));
                frame.fill(&panel, Color::from_rgb(0.96, 0.96, 0.96));
                for (row, line) in marker.popup.lines().into_iter().enumerate() {
                    frame.fill_text(Text {
                        content: line,
                        position: Point::new(origin.x + 8.0, origin.y + 5.0 + row as f32 * 16.0),
                        color: Color::from_rgb(0.1, 0.1, 0.1),
                        size: Pixels(13.0),
                        ..Text::default()
                    });
                }
            }
        }

        vec![frame.into_geometry()]
    }
}
