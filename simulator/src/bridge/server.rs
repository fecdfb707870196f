use super::model::FeedSnapshot;
use super::session::{run_session, SessionConfig};
use crate::workflow::config::ScenarioConfig;
use anyhow::{Context, Result};
use log::{info, warn};
use potholecore::channel::PushEnvelope;
use potholecore::records::{LiveDetector, PointRecord};
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
    time::Duration,
};
use tokio::runtime::Builder;
use tokio::sync::broadcast;
use warp::Filter;

const BROADCAST_CAPACITY: usize = 256;

type SharedSnapshot = Arc<RwLock<FeedSnapshot>>;

fn bind_address(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// `GET /` returning the current point collection as a JSON array.
pub fn endpoint_routes(
    state: SharedSnapshot,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());
    warp::path::end()
        .and(warp::get())
        .and(state_filter)
        .map(|state: SharedSnapshot| {
            let points = state
                .read()
                .map(|snapshot| snapshot.points.clone())
                .unwrap_or_default();
            warp::reply::json(&points)
        })
        .with(warp::cors().allow_any_origin().allow_method("GET"))
}

/// Socket.IO push channel mounted at `/socket.io/`.
pub fn channel_routes(
    events: broadcast::Sender<String>,
    session: SessionConfig,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path("socket.io")
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let receiver = events.subscribe();
            let session = session.clone();
            ws.on_upgrade(move |socket| run_session(socket, receiver, session))
        })
}

/// Hosts the endpoint and the push channel, and fans survey updates out to
/// every connected session.
pub struct FeedBridge {
    state: SharedSnapshot,
    events: broadcast::Sender<String>,
}

impl FeedBridge {
    pub fn new(points: Vec<PointRecord>) -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(FeedSnapshot::new(points))),
            events,
        }
    }

    pub fn session_config(config: &ScenarioConfig) -> SessionConfig {
        SessionConfig {
            ping_interval: Duration::from_millis(config.ping_interval_ms.max(1)),
            ping_timeout: Duration::from_millis(config.ping_timeout_ms.max(1)),
            greeting: config.greeting.clone(),
        }
    }

    /// Starts both servers on a dedicated thread.
    pub fn serve(&self, config: &ScenarioConfig) -> Result<()> {
        let endpoint = endpoint_routes(self.state.clone());
        let channel = channel_routes(self.events.clone(), Self::session_config(config));
        let http_addr = bind_address(config.http_port);
        let ws_addr = bind_address(config.ws_port);
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("building feed server runtime")?;

        thread::spawn(move || {
            runtime.block_on(async move {
                info!("[feed] endpoint on http://{http_addr}/, channel on ws://{ws_addr}");
                tokio::join!(
                    warp::serve(endpoint).run(http_addr),
                    warp::serve(channel).run(ws_addr),
                );
            });
        });
        Ok(())
    }

    /// Appends a pothole to the endpoint collection, then announces it.
    pub fn publish_point(&self, record: PointRecord) -> Result<()> {
        let envelope = PushEnvelope::pothole(&record)?;
        {
            let mut guard = self
                .state
                .write()
                .map_err(|_| anyhow::anyhow!("feed state lock poisoned"))?;
            guard.points.push(record);
        }
        self.broadcast(&envelope)
    }

    pub fn publish_detector(&self, detector: LiveDetector) -> Result<()> {
        let envelope = PushEnvelope::detector(&detector)?;
        {
            let mut guard = self
                .state
                .write()
                .map_err(|_| anyhow::anyhow!("feed state lock poisoned"))?;
            guard.detector = Some(detector);
        }
        self.broadcast(&envelope)
    }

    pub fn publish_text(&self, text: &str) -> Result<()> {
        self.broadcast(&PushEnvelope::simple_text(text))
    }

    fn broadcast(&self, envelope: &PushEnvelope) -> Result<()> {
        let json = envelope.to_json()?;
        if self.events.send(json).is_err() {
            // No session connected yet; the endpoint still has the data.
            warn!("[feed] no listeners for {}", envelope.message_type);
        }
        Ok(())
    }

    pub fn listeners(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.state
            .read()
            .map(|snapshot| snapshot.clone())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn events(&self) -> broadcast::Sender<String> {
        self.events.clone()
    }

    #[cfg(test)]
    pub fn shared_state(&self) -> SharedSnapshot {
        self.state.clone()
    }
}
