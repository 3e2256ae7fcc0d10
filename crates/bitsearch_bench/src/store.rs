//! The narrow interface the harness consumes from a dimensional store.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::encoder::SearchTerm;

/// Outcome of a single write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Success,
    NotFound,
    Invalid,
    Error,
    Unrecognized,
}

impl fmt::Display for WriteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "SUCCESS",
            Self::NotFound => "NOTFOUND",
            Self::Invalid => "INVALID",
            Self::Error => "ERROR",
            Self::Unrecognized => "unknown status",
        };
        f.write_str(name)
    }
}

/// Answer to a consistency barrier request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Barrier {
    /// Every write issued before the barrier is now searchable.
    Acknowledged,
    /// The store has no barrier primitive.
    Unsupported,
}

/// Failures talking to the store. All of them end the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{op} timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },
    #[error("connection closed by the store")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("{op} rejected by the store: {message}")]
    Rejected { op: &'static str, message: String },
    #[error("the store does not provide a consistency barrier")]
    BarrierUnsupported,
}

/// Forward-only, single-pass view over the keys a search matched.
///
/// The keys are materialized from a single store reply before the cursor is
/// built; only the walk over them is incremental. The cursor is consumed by
/// reading it and there is no way to rewind.
#[derive(Debug)]
pub struct ResultCursor {
    current: Option<Bytes>,
    rest: std::vec::IntoIter<Bytes>,
}

impl ResultCursor {
    pub fn new(keys: Vec<Bytes>) -> Self {
        let mut rest = keys.into_iter();
        let current = rest.next();
        Self { current, rest }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_key(&self) -> Option<&Bytes> {
        self.current.as_ref()
    }

    pub fn advance(&mut self) {
        self.current = self.rest.next();
    }
}

impl Iterator for ResultCursor {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        let current = self.current.take();
        self.advance();
        current
    }
}

/// Store operations used by the load driver and search verifier.
///
/// Calls are issued one at a time; implementations may assume a single
/// outstanding request.
#[async_trait]
pub trait Store: Send {
    async fn write(
        &mut self,
        space: &str,
        key: &Bytes,
        attributes: &[Bytes],
    ) -> Result<WriteStatus, StoreError>;

    async fn search(
        &mut self,
        space: &str,
        terms: &[SearchTerm],
    ) -> Result<ResultCursor, StoreError>;

    /// Wait until every write issued so far is visible to search.
    async fn sync(&mut self, _space: &str) -> Result<Barrier, StoreError> {
        Ok(Barrier::Unsupported)
    }
}
