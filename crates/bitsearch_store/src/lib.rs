//! In-memory dimensional store with exact-match secondary search, served over RESP.
//!
//! The store exists so the search harness has a concrete collaborator to run
//! against locally and in tests. It keeps every space in memory, indexes each
//! attribute position, and can delay visibility of writes to model
//! asynchronous propagation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;

pub mod redis_server;
pub mod space;

pub use space::{SpaceError, SpaceSpec, SpaceStore};

/// Runtime configuration for a store node.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub listen: SocketAddr,
    pub spaces: Vec<SpaceSpec>,
    pub propagation_delay: Duration,
}

/// Bind the RESP listener and serve until `shutdown` resolves.
pub async fn run_with_shutdown<F>(config: StoreConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = Result<(), std::io::Error>> + Send,
{
    let store = Arc::new(
        SpaceStore::with_spaces(&config.spaces, config.propagation_delay)
            .context("declare spaces")?,
    );
    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("bind {}", config.listen))?;
    let local_addr = listener.local_addr().context("read listener address")?;
    tracing::info!(
        listen = %local_addr,
        spaces = ?config.spaces.iter().map(|s| format!("{}:{}", s.name, s.dimensions)).collect::<Vec<_>>(),
        propagation_delay_ms = config.propagation_delay.as_millis() as u64,
        "bitsearch-store ready"
    );

    tokio::select! {
        res = redis_server::serve(listener, store) => res,
        res = shutdown => {
            res.context("wait for shutdown signal")?;
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
