use anyhow::Context;
use clap::Parser;
use iced::{
    widget::{canvas::Canvas, column, row, scrollable, text, Column, Container},
    Alignment, Element, Length, Subscription, Task, Theme,
};
use map::MapCanvas;
use potholecore::config::MonitorConfig;
use potholecore::render::{render_scene, MapScene, MarkerKind, MarkerStyles, TileLayer};
use potholecore::sync::{HttpPointSource, PointSource};
use potholecore::{ChannelEvent, PointRecord, SyncController, SyncEffect, SyncResult};
use std::path::PathBuf;

mod feed;
mod headless;
mod map;

const HISTORY_LIMIT: usize = 20;

#[derive(Parser)]
#[command(author, version, about = "Live pothole map")]
struct Args {
    /// Load monitor settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the point endpoint URL
    #[arg(long)]
    endpoint: Option<String>,
    /// Override the push channel URL
    #[arg(long)]
    channel: Option<String>,
    /// Access token for the tile provider
    #[arg(long)]
    tile_token: Option<String>,
    /// Run the sync loop without a window and log scene changes
    #[arg(long, default_value_t = false)]
    headless: bool,
}

fn load_config(args: &Args) -> anyhow::Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(endpoint) = &args.endpoint {
        config.endpoint_url = endpoint.clone();
    }
    if let Some(channel) = &args.channel {
        config.channel.url = channel.clone();
    }
    if let Some(token) = &args.tile_token {
        config.tiles.access_token = Some(token.clone());
    }
    config.validate().context("validating monitor config")?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;
    let source = HttpPointSource::from_config(&config).context("building endpoint client")?;

    if args.headless {
        return headless::run(config, source);
    }

    iced::application(
        move || Visualizer::boot(config.clone(), source.clone()),
        Visualizer::update,
        Visualizer::view,
    )
    .title(application_title)
    .subscription(application_subscription)
    .theme(application_theme)
    .run()
    .map_err(|err| anyhow::anyhow!("running visualizer window: {err}"))
}

fn application_title(_: &Visualizer) -> String {
    "Pothole Map".into()
}

fn application_subscription(state: &Visualizer) -> Subscription<Message> {
    feed::channel_events(&state.config.channel).map(Message::Channel)
}

fn application_theme(_: &Visualizer) -> Theme {
    Theme::Dark
}

#[derive(Debug)]
struct Visualizer {
    config: MonitorConfig,
    source: HttpPointSource,
    controller: SyncController,
    styles: MarkerStyles,
    tiles: TileLayer,
    scene: MapScene,
    status: String,
    history: Vec<String>,
}

#[derive(Debug, Clone)]
enum Message {
    Channel(ChannelEvent),
    PointsFetched(SyncResult<Vec<PointRecord>>),
}

impl Visualizer {
    fn boot(config: MonitorConfig, source: HttpPointSource) -> (Self, Task<Message>) {
        let mut state = Visualizer {
            tiles: TileLayer::new(config.tiles.clone()),
            config,
            source,
            controller: SyncController::new(),
            styles: MarkerStyles::default(),
            scene: MapScene::default(),
            status: "Waiting for the endpoint...".into(),
            history: Vec::new(),
        };
        let effect = state.controller.mount();
        let task = state.run_effect(effect);
        (state, task)
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Channel(event) => {
                let entry = match &event {
                    ChannelEvent::Connected => Some("Channel connected".to_string()),
                    ChannelEvent::Disconnected => Some("Channel disconnected".to_string()),
                    ChannelEvent::Message(_) | ChannelEvent::Pong => None,
                };
                let effect = state.controller.handle_event(event);
                if let Some(entry) = entry {
                    state.status = entry.clone();
                    state.push_history(entry);
                }
                state.refresh_scene();
                match effect {
                    Some(effect) => {
                        state.push_history("Pothole reported, refreshing".into());
                        state.run_effect(effect)
                    }
                    None => Task::none(),
                }
            }
            Message::PointsFetched(result) => {
                match &result {
                    Ok(points) => {
                        state.status = format!("Endpoint returned {} potholes", points.len());
                        state.push_history(state.status.clone());
                    }
                    Err(err) => {
                        state.status = format!("Endpoint error: {err}");
                        state.push_history(state.status.clone());
                    }
                }
                state.controller.apply_refresh(result);
                state.refresh_scene();
                Task::none()
            }
        }
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let store = state.controller.store();
        let metrics = state.controller.metrics();
        let center_tile = state
            .tiles
            .tile_at(state.config.view.center, f64::from(state.config.view.zoom));

        let detector_info = match store.detector() {
            Some(detector) => text(format!(
                "Detector {}: {:.5}, {:.5}",
                detector.name.as_deref().unwrap_or(&detector.id),
                detector.current_position.latitude,
                detector.current_position.longitude
            )),
            None => text("Detector: n/a"),
        }
        .size(14);

        let history_list = if state.history.is_empty() {
            Column::new().push(text("No activity yet").size(12))
        } else {
            state
                .history
                .iter()
                .rev()
                .fold(Column::new().spacing(4), |col, entry| {
                    col.push(text(entry.clone()).size(12))
                })
        };

        let side_panel = column![
            text("Live feed").size(26),
            text(if store.is_connected() {
                "Channel: connected"
            } else {
                "Channel: disconnected"
            })
            .size(16),
            text(format!(
                "Potholes: {}",
                state.scene.count(MarkerKind::Pothole)
            ))
            .size(16),
            detector_info,
            text(format!(
                "Messages {} | refreshes {}/{} | failures {}",
                metrics.messages,
                metrics.refreshes_applied,
                metrics.refreshes_requested,
                metrics.failures
            ))
            .size(12),
            text(format!(
                "Tiles: {} @ z{}/{}/{}",
                state.config.tiles.style_id, center_tile.z, center_tile.x, center_tile.y
            ))
            .size(12),
            text(&state.status).size(14),
            text("Activity log").size(16),
            Container::new(scrollable(history_list).height(Length::Fill)).padding(6),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fixed(320.0));

        let map = Canvas::new(MapCanvas::new(
            state.scene.clone(),
            state.config.view.center,
            f64::from(state.config.view.zoom),
            state.tiles.clone(),
        ))
        .width(Length::Fill)
        .height(Length::Fill);

        let layout = row![side_panel, map]
            .spacing(12)
            .align_y(Alignment::Start)
            .padding(12);

        Container::new(layout)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn run_effect(&self, effect: SyncEffect) -> Task<Message> {
        match effect {
            SyncEffect::RefreshPoints => {
                let source = self.source.clone();
                Task::perform(
                    async move { source.fetch_points().await },
                    Message::PointsFetched,
                )
            }
        }
    }

    fn refresh_scene(&mut self) {
        self.scene = render_scene(self.controller.store(), &self.styles);
    }

    fn push_history(&mut self, entry: String) {
        self.history.push(entry);
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use potholecore::channel::PushEnvelope;
    use potholecore::{GeoPosition, LiveDetector, SyncError};

    fn visualizer() -> Visualizer {
        let config = MonitorConfig::default();
        let source = HttpPointSource::from_config(&config).unwrap();
        Visualizer::boot(config, source).0
    }

    fn args(endpoint: Option<&str>, channel: Option<&str>) -> Args {
        Args {
            config: None,
            endpoint: endpoint.map(str::to_string),
            channel: channel.map(str::to_string),
            tile_token: Some("pk.local".into()),
            headless: false,
        }
    }

    #[test]
    fn cli_overrides_apply_over_defaults() {
        let config = load_config(&args(Some("https://roads.example/"), None)).unwrap();
        assert_eq!(config.endpoint_url, "https://roads.example/");
        assert_eq!(config.channel.url, "ws://localhost:3030");
        assert_eq!(config.tiles.access_token.as_deref(), Some("pk.local"));
    }

    #[test]
    fn cli_override_with_bad_scheme_is_rejected() {
        assert!(load_config(&args(None, Some("http://localhost:3030"))).is_err());
    }

    #[test]
    fn fetched_points_and_detector_reach_the_scene() {
        let mut state = visualizer();
        let _ = Visualizer::update(
            &mut state,
            Message::PointsFetched(Ok(vec![
                PointRecord::new("a", 20.0, 5.0),
                PointRecord::new("b", 22.0, 8.0),
            ])),
        );
        let detector = LiveDetector::new("d1", GeoPosition::new(1.0, 2.0));
        let raw = PushEnvelope::detector(&detector).unwrap().to_json().unwrap();
        let _ = Visualizer::update(&mut state, Message::Channel(ChannelEvent::Message(raw)));

        assert_eq!(state.scene.count(MarkerKind::Pothole), 2);
        assert_eq!(
            state.scene.detector().unwrap().position,
            GeoPosition::new(1.0, 2.0)
        );
    }

    #[test]
    fn failed_fetch_keeps_markers_and_reports_status() {
        let mut state = visualizer();
        let _ = Visualizer::update(
            &mut state,
            Message::PointsFetched(Ok(vec![PointRecord::new("a", 20.0, 5.0)])),
        );
        let _ = Visualizer::update(
            &mut state,
            Message::PointsFetched(Err(SyncError::Status(502))),
        );
        assert_eq!(state.scene.count(MarkerKind::Pothole), 1);
        assert!(state.status.contains("502"));
    }

    #[test]
    fn connection_events_toggle_flag_and_log() {
        let mut state = visualizer();
        let _ = Visualizer::update(&mut state, Message::Channel(ChannelEvent::Connected));
        let _ = Visualizer::update(&mut state, Message::Channel(ChannelEvent::Disconnected));
        assert!(!state.controller.store().is_connected());
        assert_eq!(
            state.history,
            vec!["Channel connected".to_string(), "Channel disconnected".to_string()]
        );
    }
}
