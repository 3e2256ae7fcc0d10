//! Full run: load, settle, then timed verification over the same range.

use serde::Serialize;

use crate::load::{load, LoadReport, SettleConfig};
use crate::store::{Store, StoreError};
use crate::timing::time_verification;
use crate::verify::VerificationReport;

#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub space: String,
    pub count: u32,
    pub settle: SettleConfig,
}

/// Everything a run observed, serialized as the JSON run report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub space: String,
    pub count: u32,
    pub load: LoadReport,
    pub verification: VerificationReport,
    pub elapsed_ns: u64,
}

impl RunReport {
    pub fn anomaly_count(&self) -> u64 {
        self.load.anomalies.total + self.verification.anomalies.total
    }
}

/// Run the load and verification phases back to back on one store connection.
pub async fn run<S>(store: &mut S, config: &HarnessConfig) -> Result<RunReport, StoreError>
where
    S: Store + ?Sized,
{
    let load_report = load(store, &config.space, config.count, &config.settle).await?;
    tracing::info!(space = %config.space, settled = ?load_report.settled, "starting searches");

    let timed = time_verification(store, &config.space, config.count).await?;
    let elapsed_ns = timed.elapsed_nanos();
    Ok(RunReport {
        space: config.space.clone(),
        count: config.count,
        load: load_report,
        verification: timed.report,
        elapsed_ns,
    })
}
