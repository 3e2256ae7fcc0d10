//! Correctness and latency harness for exact-match secondary index search.
//!
//! The harness loads `count` records into a space, where record `n` carries
//! 32 dimensions encoding the bits of `n`. It then searches for every record
//! by those 32 values, checks that exactly the original key comes back, and
//! times the whole search pass.

pub mod args;
pub mod encoder;
pub mod harness;
pub mod load;
pub mod resp;
pub mod sample;
pub mod store;
pub mod timing;
pub mod verify;

pub use encoder::{decode_attributes, decode_key, encode, Record, SearchTerm, DIMENSIONS};
pub use harness::{run, HarnessConfig, RunReport};
pub use load::{SettleConfig, SettleMode, Settled};
pub use resp::RespStore;
pub use sample::{AnomalySample, ANOMALY_SAMPLE_LIMIT};
pub use store::{Barrier, ResultCursor, Store, StoreError, WriteStatus};
pub use verify::SearchAnomaly;
