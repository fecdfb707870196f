use super::{PointSource, SyncController, SyncEffect};
use crate::channel::{ChannelEvent, PushChannel};
use crate::prelude::SyncResult;
use crate::records::PointRecord;
use crate::store::PositionStore;
use crate::telemetry::LogManager;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tokio::sync::{mpsc, oneshot, watch};

const FEED_QUEUE_DEPTH: usize = 64;

/// Headless driver wiring a channel, a point source and a controller.
///
/// The channel runs in its own task and feeds a queue. Endpoint reads are
/// never cancelled, and each one is applied when it completes. Every store
/// change is published on a watch channel.
pub struct LiveSync<C, S> {
    channel: C,
    source: S,
    controller: SyncController,
    updates: watch::Sender<PositionStore>,
    logger: LogManager,
}

impl<C, S> LiveSync<C, S>
where
    C: PushChannel + Send + 'static,
    S: PointSource + Clone,
{
    pub fn new(channel: C, source: S, controller: SyncController) -> Self {
        let (updates, _) = watch::channel(controller.store().clone());
        Self {
            channel,
            source,
            controller,
            updates,
            logger: LogManager::new("live-sync"),
        }
    }

    pub fn updates(&self) -> watch::Receiver<PositionStore> {
        self.updates.subscribe()
    }

    /// Runs until the channel ends, then finishes outstanding reads.
    pub async fn run(self) -> SyncController {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs until the channel ends or `shutdown` resolves. Reads still in
    /// flight at shutdown are dropped.
    pub async fn run_until<F>(self, shutdown: F) -> SyncController
    where
        F: Future<Output = ()>,
    {
        let LiveSync {
            mut channel,
            source,
            mut controller,
            updates,
            logger,
        } = self;

        controller.attach(&mut channel);
        let (event_tx, mut event_rx) = mpsc::channel::<ChannelEvent>(FEED_QUEUE_DEPTH);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let feed = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = channel.next_event() => match event {
                        Some(event) => {
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = &mut stop_rx => break,
                }
            }
            channel
        });

        let mut in_flight = FuturesUnordered::new();
        match controller.mount() {
            SyncEffect::RefreshPoints => in_flight.push(read_points(source.clone())),
        }

        tokio::pin!(shutdown);
        let mut feed_open = true;
        loop {
            if !feed_open && in_flight.is_empty() {
                break;
            }
            tokio::select! {
                event = event_rx.recv(), if feed_open => match event {
                    Some(event) => {
                        if let Some(SyncEffect::RefreshPoints) = controller.handle_event(event) {
                            in_flight.push(read_points(source.clone()));
                        }
                        updates.send_if_modified(|store| replace_if_changed(store, controller.store()));
                    }
                    None => {
                        logger.record("channel ended; finishing outstanding reads");
                        feed_open = false;
                    }
                },
                Some(result) = in_flight.next(), if !in_flight.is_empty() => {
                    if controller.apply_refresh(result) {
                        updates.send_replace(controller.store().clone());
                    }
                }
                _ = &mut shutdown => {
                    logger.record("shutdown requested");
                    break;
                }
                else => break,
            }
        }

        // Unblocks a feed task parked on a full queue.
        drop(event_rx);
        let _ = stop_tx.send(());
        match feed.await {
            Ok(mut channel) => {
                controller.detach(&mut channel);
                channel.close().await;
            }
            Err(err) => logger.warn(&format!("feed task failed: {err}")),
        }
        controller
    }
}

async fn read_points<S: PointSource>(source: S) -> SyncResult<Vec<PointRecord>> {
    source.fetch_points().await
}

fn replace_if_changed(current: &mut PositionStore, latest: &PositionStore) -> bool {
    if current == latest {
        false
    } else {
        *current = latest.clone();
        true
    }
}
