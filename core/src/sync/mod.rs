//! Reconciles push notifications with endpoint reads.
//!
//! The controller is transport-free: it consumes `ChannelEvent`s, mutates the
//! `PositionStore`, and returns `SyncEffect`s for the caller to run. Reads are
//! applied in the order they complete.

pub mod driver;
pub mod source;

pub use driver::LiveSync;
pub use source::{HttpPointSource, PointSource};

use crate::channel::envelope::{decode_notice, PushNotice};
use crate::channel::{ChannelEvent, PushChannel, Signal};
use crate::prelude::SyncResult;
use crate::records::PointRecord;
use crate::store::PositionStore;
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use std::sync::Arc;

/// Side effect requested by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEffect {
    /// Read the full point collection from the endpoint.
    RefreshPoints,
}

#[derive(Debug)]
pub struct SyncController {
    store: PositionStore,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl SyncController {
    /// Signals the controller listens to; teardown releases the same set.
    pub const SIGNALS: [Signal; 4] = Signal::ALL;

    pub fn new() -> Self {
        Self::with_metrics(Arc::new(MetricsRecorder::new()))
    }

    pub fn with_metrics(metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            store: PositionStore::new(),
            metrics,
            logger: LogManager::new("sync"),
        }
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn attach<C: PushChannel>(&self, channel: &mut C) {
        for signal in Self::SIGNALS {
            channel.subscribe(signal);
        }
    }

    pub fn detach<C: PushChannel>(&self, channel: &mut C) {
        for signal in Self::SIGNALS {
            channel.unsubscribe(signal);
        }
    }

    /// Initial population of the store; always asks for one read.
    pub fn mount(&mut self) -> SyncEffect {
        self.metrics.record_refresh_requested();
        SyncEffect::RefreshPoints
    }

    pub fn handle_event(&mut self, event: ChannelEvent) -> Option<SyncEffect> {
        match event {
            ChannelEvent::Connected => {
                self.store.set_connected(true);
                self.logger.record("channel connected");
                None
            }
            ChannelEvent::Disconnected => {
                self.store.set_connected(false);
                self.logger.record("channel disconnected");
                None
            }
            ChannelEvent::Pong => {
                self.logger.debug("heartbeat");
                None
            }
            ChannelEvent::Message(raw) => {
                self.metrics.record_message();
                self.handle_message(&raw)
            }
        }
    }

    fn handle_message(&mut self, raw: &str) -> Option<SyncEffect> {
        let notice = match decode_notice(raw) {
            Ok(notice) => notice,
            Err(err) => {
                self.metrics.record_failure();
                self.logger.warn(&format!("dropping push message: {err}"));
                return None;
            }
        };

        match notice {
            PushNotice::SimpleText(text) => {
                self.metrics.record_ignored();
                self.logger.record(&text);
                None
            }
            PushNotice::PotholePosition(record) => {
                match record {
                    Ok(record) => self.logger.record(&format!(
                        "pothole reported at {} {}",
                        record.latitude, record.longitude
                    )),
                    Err(err) => self
                        .logger
                        .warn(&format!("pothole payload not decodable, refreshing anyway: {err}")),
                }
                self.metrics.record_refresh_requested();
                Some(SyncEffect::RefreshPoints)
            }
            PushNotice::DetectorPosition(detector) => {
                self.logger.debug(&format!(
                    "detector {} at {} {}",
                    detector.id,
                    detector.current_position.latitude,
                    detector.current_position.longitude
                ));
                self.store.set_detector(detector);
                None
            }
            PushNotice::Unknown { raw, .. } => {
                self.metrics.record_ignored();
                self.logger.warn(&format!("unknown push message: {raw}"));
                None
            }
        }
    }

    /// Applies a completed endpoint read. Failures keep the previous
    /// collection; returns whether the store changed.
    pub fn apply_refresh(&mut self, result: SyncResult<Vec<PointRecord>>) -> bool {
        match result {
            Ok(points) => {
                self.logger
                    .record(&format!("endpoint returned {} records", points.len()));
                self.metrics.record_refresh_applied();
                self.store.replace_points(points);
                true
            }
            Err(err) => {
                self.metrics.record_failure();
                self.logger.warn(&format!("endpoint read failed: {err}"));
                false
            }
        }
    }
}

impl Default for SyncController {
    fn default() -> Self {
        Self::new()
    }
}
