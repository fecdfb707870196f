use std::sync::Mutex;

/// Counters describing sync activity since start-up.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages: usize,
    pub refreshes_requested: usize,
    pub refreshes_applied: usize,
    pub ignored: usize,
    pub failures: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn bump(&self, update: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            update(&mut metrics);
        }
    }

    pub fn record_message(&self) {
        self.bump(|m| m.messages += 1);
    }

    pub fn record_refresh_requested(&self) {
        self.bump(|m| m.refreshes_requested += 1);
    }

    pub fn record_refresh_applied(&self) {
        self.bump(|m| m.refreshes_applied += 1);
    }

    pub fn record_ignored(&self) {
        self.bump(|m| m.ignored += 1);
    }

    pub fn record_failure(&self) {
        self.bump(|m| m.failures += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|m| *m).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MetricsRecorder").field(&self.snapshot()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counts() {
        let metrics = MetricsRecorder::new();
        metrics.record_message();
        metrics.record_message();
        metrics.record_refresh_requested();
        metrics.record_failure();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages, 2);
        assert_eq!(snapshot.refreshes_requested, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.refreshes_applied, 0);
    }
}
