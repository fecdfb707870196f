use crate::bridge::server::FeedBridge;
use crate::generator::survey::{Survey, SurveyStep};
use crate::workflow::config::ScenarioConfig;
use anyhow::Context;
use log::info;
use std::future::Future;
use std::time::Duration;

/// Counts of what a single tick published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub detector_updates: usize,
    pub potholes: usize,
}

/// Drives the survey and publishes each step through the bridge.
#[derive(Clone)]
pub struct Runner {
    config: ScenarioConfig,
}

impl Runner {
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    pub fn tick(&self, survey: &mut Survey, bridge: &FeedBridge) -> anyhow::Result<TickReport> {
        let SurveyStep { detector, pothole } = survey.step();
        let mut report = TickReport::default();

        bridge
            .publish_detector(detector)
            .context("publishing detector position")?;
        report.detector_updates += 1;

        if let Some(record) = pothole {
            info!(
                "[feed] pothole {} at {:.5} {:.5}",
                record.id, record.latitude, record.longitude
            );
            bridge
                .publish_point(record)
                .context("publishing pothole position")?;
            report.potholes += 1;
        }
        Ok(report)
    }

    /// Ticks every `tick_ms` until `shutdown` resolves; returns the totals.
    pub async fn run<F>(
        &self,
        survey: &mut Survey,
        bridge: &FeedBridge,
        shutdown: F,
    ) -> anyhow::Result<TickReport>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.tick_ms.max(1)));
        let mut totals = TickReport::default();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick(survey, bridge)?;
                    totals.detector_updates += report.detector_updates;
                    totals.potholes += report.potholes;
                }
                _ = &mut shutdown => break,
            }
        }
        Ok(totals)
    }
}
