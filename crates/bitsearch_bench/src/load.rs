//! Load driver: writes every record in `[0, count)`, then waits for the store
//! to settle before search verification starts.
//!
//! Non-success write statuses are observations, not faults. They are logged,
//! counted in the [`LoadReport`] (with a bounded sample) and the loop moves on.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::encoder::encode;
use crate::sample::AnomalySample;
use crate::store::{Barrier, Store, StoreError, WriteStatus};

/// How the driver waits for written records to become searchable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SettleMode {
    /// Use the store's barrier, fall back to the fixed pause when it has none.
    #[default]
    Auto,
    /// Require the store's barrier.
    Sync,
    /// Always sleep for the fixed pause.
    Sleep,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid settle mode {0:?} (expected auto, sync or sleep)")]
pub struct SettleModeError(String);

impl FromStr for SettleMode {
    type Err = SettleModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "sync" => Ok(Self::Sync),
            "sleep" => Ok(Self::Sleep),
            _ => Err(SettleModeError(s.to_string())),
        }
    }
}

impl fmt::Display for SettleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Sync => "sync",
            Self::Sleep => "sleep",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettleConfig {
    pub mode: SettleMode,
    /// Pause used by [`SettleMode::Sleep`] and by the [`SettleMode::Auto`] fallback.
    pub pause: Duration,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            mode: SettleMode::Auto,
            pause: Duration::from_secs(1),
        }
    }
}

/// How the load phase actually settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Settled {
    Acknowledged,
    Slept { pause_ms: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WriteAnomaly {
    pub id: u32,
    pub status: WriteStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub writes: u32,
    pub anomalies: AnomalySample<WriteAnomaly>,
    pub settled: Settled,
}

/// Write all records in `[0, count)` to `space`, then settle.
pub async fn load<S>(
    store: &mut S,
    space: &str,
    count: u32,
    settle_config: &SettleConfig,
) -> Result<LoadReport, StoreError>
where
    S: Store + ?Sized,
{
    let mut writes = 0u32;
    let mut anomalies = AnomalySample::default();

    for id in 0..count {
        let record = encode(id);
        let status = store.write(space, &record.key, &record.attributes).await?;
        writes += 1;
        if status != WriteStatus::Success {
            tracing::warn!(id, %status, "put returned {status}");
            anomalies.record(WriteAnomaly { id, status });
        }
    }
    tracing::info!(
        space,
        writes,
        anomalies = anomalies.total,
        "load complete"
    );

    let settled = settle(store, space, settle_config).await?;
    Ok(LoadReport {
        writes,
        anomalies,
        settled,
    })
}

/// Wait until records written so far are visible to search.
pub async fn settle<S>(store: &mut S, space: &str, config: &SettleConfig) -> Result<Settled, StoreError>
where
    S: Store + ?Sized,
{
    match config.mode {
        SettleMode::Sleep => Ok(pause(config.pause).await),
        SettleMode::Sync => match store.sync(space).await? {
            Barrier::Acknowledged => Ok(Settled::Acknowledged),
            Barrier::Unsupported => Err(StoreError::BarrierUnsupported),
        },
        SettleMode::Auto => match store.sync(space).await? {
            Barrier::Acknowledged => {
                tracing::debug!(space, "store acknowledged consistency barrier");
                Ok(Settled::Acknowledged)
            }
            Barrier::Unsupported => {
                tracing::info!(
                    space,
                    pause_ms = config.pause.as_millis() as u64,
                    "store has no consistency barrier; falling back to a fixed pause"
                );
                Ok(pause(config.pause).await)
            }
        },
    }
}

async fn pause(duration: Duration) -> Settled {
    tokio::time::sleep(duration).await;
    Settled::Slept {
        pause_ms: duration.as_millis() as u64,
    }
}
