//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bitsearch_bench::encoder::{decode_attributes, decode_key, SearchTerm};
use bitsearch_bench::{Barrier, ResultCursor, Store, StoreError, WriteStatus};
use bitsearch_store::{redis_server, SpaceSpec, SpaceStore};
use bytes::Bytes;
use tokio::net::TcpListener;

/// In-memory [`Store`] with scripted misbehavior per identifier.
///
/// Records written with `Success` are kept and searched by exact match over
/// every term, so an unscripted store behaves like a fully propagated one.
pub struct ScriptedStore {
    records: BTreeMap<Bytes, Vec<Bytes>>,
    /// Status to return for a given identifier's write. Only `Success` stores the record.
    pub write_statuses: HashMap<u32, WriteStatus>,
    /// Keys appended to the honest results of an identifier's search.
    pub extra_results: HashMap<u32, Vec<Bytes>>,
    /// Keys returned instead of the honest results of an identifier's search.
    pub replaced_results: HashMap<u32, Vec<Bytes>>,
    /// Identifier whose search fails with a transport error.
    pub fail_search_at: Option<u32>,
    pub barrier: Barrier,
    pub writes: Vec<u32>,
    pub searches: Vec<u32>,
    pub syncs: usize,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            write_statuses: HashMap::new(),
            extra_results: HashMap::new(),
            replaced_results: HashMap::new(),
            fail_search_at: None,
            barrier: Barrier::Acknowledged,
            writes: Vec::new(),
            searches: Vec::new(),
            syncs: 0,
        }
    }

    pub fn stored(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl Store for ScriptedStore {
    async fn write(
        &mut self,
        _space: &str,
        key: &Bytes,
        attributes: &[Bytes],
    ) -> Result<WriteStatus, StoreError> {
        let id = decode_key(key).expect("harness writes 4-byte keys");
        self.writes.push(id);
        let status = self
            .write_statuses
            .get(&id)
            .copied()
            .unwrap_or(WriteStatus::Success);
        if status == WriteStatus::Success {
            self.records.insert(key.clone(), attributes.to_vec());
        }
        Ok(status)
    }

    async fn search(
        &mut self,
        _space: &str,
        terms: &[SearchTerm],
    ) -> Result<ResultCursor, StoreError> {
        let mut values = terms.to_vec();
        values.sort_by_key(|t| t.dimension);
        let values = values.into_iter().map(|t| t.value).collect::<Vec<_>>();
        let id = decode_attributes(&values).expect("harness searches all 32 dimensions");
        self.searches.push(id);

        if self.fail_search_at == Some(id) {
            return Err(StoreError::Closed);
        }
        if let Some(keys) = self.replaced_results.get(&id) {
            return Ok(ResultCursor::new(keys.clone()));
        }

        let mut keys = self
            .records
            .iter()
            .filter(|(_, attributes)| {
                terms
                    .iter()
                    .all(|t| attributes.get(t.dimension) == Some(&t.value))
            })
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        if let Some(extra) = self.extra_results.get(&id) {
            keys.extend(extra.iter().cloned());
        }
        Ok(ResultCursor::new(keys))
    }

    async fn sync(&mut self, _space: &str) -> Result<Barrier, StoreError> {
        self.syncs += 1;
        Ok(self.barrier)
    }
}

/// Start an in-process store serving RESP on an ephemeral local port.
pub async fn start_store(
    spaces: &[(&str, usize)],
    propagation_delay: Duration,
) -> (SocketAddr, Arc<SpaceStore>) {
    let specs = spaces
        .iter()
        .map(|(name, dimensions)| SpaceSpec {
            name: name.to_string(),
            dimensions: *dimensions,
        })
        .collect::<Vec<_>>();
    let store = Arc::new(SpaceStore::with_spaces(&specs, propagation_delay).expect("declare spaces"));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind store");
    let addr = listener.local_addr().expect("store addr");
    let serving = store.clone();
    tokio::spawn(async move {
        if let Err(err) = redis_server::serve(listener, serving).await {
            eprintln!("store stopped: {err:#}");
        }
    });
    (addr, store)
}
