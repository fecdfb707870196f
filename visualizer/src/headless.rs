use anyhow::Context;
use log::{debug, info};
use potholecore::channel::SocketChannel;
use potholecore::config::MonitorConfig;
use potholecore::render::{render_scene, MarkerKind, MarkerStyles};
use potholecore::sync::{HttpPointSource, LiveSync};
use potholecore::SyncController;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;

/// Runs the sync loop without a window and logs every scene change.
pub fn run(config: MonitorConfig, source: HttpPointSource) -> anyhow::Result<()> {
    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating headless runtime")?;

    let controller = runtime.block_on(async move {
        let channel = SocketChannel::new(config.channel.clone());
        let sync = LiveSync::new(channel, source, SyncController::new());
        let mut updates = sync.updates();
        let styles = MarkerStyles::default();

        let reporter = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let scene = {
                    let store = updates.borrow_and_update();
                    render_scene(&store, &styles)
                };
                info!(
                    "scene: {} potholes, detector {}",
                    scene.count(MarkerKind::Pothole),
                    scene
                        .detector()
                        .map(|marker| marker.popup.to_string().replace('\n', ", "))
                        .unwrap_or_else(|| "absent".into())
                );
                if let Ok(json) = serde_json::to_string(&scene) {
                    debug!("scene json: {json}");
                }
            }
        });

        let controller = sync
            .run_until(async {
                let _ = signal::ctrl_c().await;
            })
            .await;
        reporter.abort();
        controller
    });

    let metrics = controller.metrics();
    println!(
        "Headless run -> messages {}, refreshes {}/{}, ignored {}, failures {}, points {}",
        metrics.messages,
        metrics.refreshes_applied,
        metrics.refreshes_requested,
        metrics.ignored,
        metrics.failures,
        controller.store().points().len()
    );
    Ok(())
}
