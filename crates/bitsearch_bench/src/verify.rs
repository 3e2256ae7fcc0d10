//! Search verifier: for every identifier, search with the terms its record
//! was written with and check that exactly that record comes back.

use bytes::Bytes;
use serde::{Serialize, Serializer};

use crate::encoder::{encode, Record};
use crate::sample::{AnomalySample, ANOMALY_SAMPLE_LIMIT};
use crate::store::{ResultCursor, Store, StoreError};

/// Ways a single search can disagree with the loaded data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchAnomaly {
    NotFound {
        id: u32,
    },
    KeyMismatch {
        id: u32,
        #[serde(serialize_with = "as_hex")]
        expected: Bytes,
        #[serde(serialize_with = "as_hex")]
        actual: Bytes,
    },
    MultipleMatches {
        id: u32,
    },
}

impl SearchAnomaly {
    pub fn id(&self) -> u32 {
        match self {
            Self::NotFound { id } | Self::KeyMismatch { id, .. } | Self::MultipleMatches { id } => {
                *id
            }
        }
    }
}

fn as_hex<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// Per-kind anomaly counts plus a bounded sample of the anomalies themselves.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub searches: u32,
    pub not_found: u64,
    pub mismatches: u64,
    pub multiple_matches: u64,
    pub anomalies: AnomalySample<SearchAnomaly>,
}

impl VerificationReport {
    pub fn with_sample_limit(limit: usize) -> Self {
        Self {
            anomalies: AnomalySample::with_limit(limit),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn record(&mut self, anomaly: SearchAnomaly) {
        match anomaly {
            SearchAnomaly::NotFound { .. } => self.not_found += 1,
            SearchAnomaly::KeyMismatch { .. } => self.mismatches += 1,
            SearchAnomaly::MultipleMatches { .. } => self.multiple_matches += 1,
        }
        self.anomalies.record(anomaly);
    }
}

/// Search for every identifier in `[0, count)` and verify the single-result invariant.
///
/// Anomalies never stop the pass. Store errors do.
pub async fn verify_all<S>(store: &mut S, space: &str, count: u32) -> Result<VerificationReport, StoreError>
where
    S: Store + ?Sized,
{
    verify_sampled(store, space, count, ANOMALY_SAMPLE_LIMIT).await
}

/// [`verify_all`] keeping at most `sample_limit` anomalies in the report.
pub async fn verify_sampled<S>(
    store: &mut S,
    space: &str,
    count: u32,
    sample_limit: usize,
) -> Result<VerificationReport, StoreError>
where
    S: Store + ?Sized,
{
    let mut report = VerificationReport::with_sample_limit(sample_limit);
    for id in 0..count {
        let record = encode(id);
        let cursor = store.search(space, &record.search_terms()).await?;
        report.searches += 1;
        for anomaly in check_results(&record, cursor) {
            report.record(anomaly);
        }
    }
    Ok(report)
}

/// Compare a search's results against the record it should have matched.
pub fn check_results(record: &Record, mut cursor: ResultCursor) -> Vec<SearchAnomaly> {
    let id = record.id;
    let Some(actual) = cursor.current_key().cloned() else {
        tracing::warn!(id, "number {id} found nothing");
        return vec![SearchAnomaly::NotFound { id }];
    };

    let mut anomalies = Vec::new();
    if actual != record.key {
        tracing::warn!(
            id,
            expected = %hex::encode(&record.key),
            actual = %hex::encode(&actual),
            "number {id} returned wrong key"
        );
        anomalies.push(SearchAnomaly::KeyMismatch {
            id,
            expected: record.key.clone(),
            actual,
        });
    }

    cursor.advance();
    if cursor.has_current() {
        tracing::warn!(id, "number {id} found more than one result");
        anomalies.push(SearchAnomaly::MultipleMatches { id });
    }
    anomalies
}
