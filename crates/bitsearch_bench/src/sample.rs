//! Bounded anomaly retention for reports.
//!
//! Every anomaly is counted, but only the first `limit` are kept, so a run
//! over the full `u32` range where nothing propagated still finishes in
//! constant memory.

use serde::Serialize;

/// Anomalies kept per phase when no other limit is given.
pub const ANOMALY_SAMPLE_LIMIT: usize = 1_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnomalySample<T> {
    /// Anomalies observed, kept or not.
    pub total: u64,
    /// The first anomalies observed, in order.
    pub sample: Vec<T>,
    /// Set once an anomaly was counted but not kept.
    pub truncated: bool,
    #[serde(skip)]
    limit: usize,
}

impl<T> AnomalySample<T> {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            total: 0,
            sample: Vec::new(),
            truncated: false,
            limit,
        }
    }

    pub fn record(&mut self, anomaly: T) {
        self.total += 1;
        if self.sample.len() < self.limit {
            self.sample.push(anomaly);
        } else {
            self.truncated = true;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.sample.iter()
    }
}

impl<T> Default for AnomalySample<T> {
    fn default() -> Self {
        Self::with_limit(ANOMALY_SAMPLE_LIMIT)
    }
}
