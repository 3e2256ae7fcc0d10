//! [`Store`] over a single RESP2 connection.
//!
//! Requests are `PUT`, `SEARCH` and `SYNC` arrays of bulk strings. Error
//! replies carry a status word (`NOTFOUND`, `INVALID`, `ERR`) as their first
//! token, which maps onto [`WriteStatus`] for writes.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use redis_protocol::codec::Resp2;
use redis_protocol::resp2::types::BytesFrame;
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::codec::Framed;

use crate::encoder::SearchTerm;
use crate::store::{Barrier, ResultCursor, Store, StoreError, WriteStatus};

pub struct RespStore {
    conn: Framed<TcpStream, Resp2>,
    op_timeout: Duration,
}

impl RespStore {
    pub async fn connect(addr: SocketAddr, op_timeout: Duration) -> Result<Self, StoreError> {
        let socket = time::timeout(op_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| StoreError::Timeout {
                op: "connect",
                timeout: op_timeout,
            })?
            .map_err(|source| StoreError::Connect { addr, source })?;
        socket.set_nodelay(true).ok();
        tracing::debug!(%addr, "connected to store");
        Ok(Self {
            conn: Framed::new(socket, Resp2::default()),
            op_timeout,
        })
    }

    /// Send one request and wait for its reply, each half bounded by the op timeout.
    async fn round_trip(&mut self, op: &'static str, req: BytesFrame) -> Result<BytesFrame, StoreError> {
        match time::timeout(self.op_timeout, self.conn.send(req)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(StoreError::Protocol(format!("{op} send failed: {err}"))),
            Err(_) => {
                return Err(StoreError::Timeout {
                    op,
                    timeout: self.op_timeout,
                })
            }
        }

        match time::timeout(self.op_timeout, self.conn.next()).await {
            Ok(Some(Ok(frame))) => Ok(frame),
            Ok(Some(Err(err))) => Err(StoreError::Protocol(format!("{op} recv failed: {err}"))),
            Ok(None) => Err(StoreError::Closed),
            Err(_) => Err(StoreError::Timeout {
                op,
                timeout: self.op_timeout,
            }),
        }
    }
}

#[async_trait]
impl Store for RespStore {
    async fn write(
        &mut self,
        space: &str,
        key: &Bytes,
        attributes: &[Bytes],
    ) -> Result<WriteStatus, StoreError> {
        let resp = self.round_trip("put", make_put(space, key, attributes)).await?;
        Ok(parse_put_response(resp))
    }

    async fn search(
        &mut self,
        space: &str,
        terms: &[SearchTerm],
    ) -> Result<ResultCursor, StoreError> {
        let resp = self.round_trip("search", make_search(space, terms)).await?;
        parse_search_response(resp).map(ResultCursor::new)
    }

    async fn sync(&mut self, space: &str) -> Result<Barrier, StoreError> {
        let resp = self.round_trip("sync", make_sync(space)).await?;
        parse_sync_response(resp)
    }
}

fn bulk(bytes: Bytes) -> BytesFrame {
    BytesFrame::BulkString(bytes)
}

fn bulk_str(s: &str) -> BytesFrame {
    BytesFrame::BulkString(Bytes::copy_from_slice(s.as_bytes()))
}

/// Build a RESP PUT request frame.
fn make_put(space: &str, key: &Bytes, attributes: &[Bytes]) -> BytesFrame {
    let mut parts = Vec::with_capacity(attributes.len() + 3);
    parts.push(BytesFrame::BulkString(Bytes::from_static(b"PUT")));
    parts.push(bulk_str(space));
    parts.push(bulk(key.clone()));
    parts.extend(attributes.iter().cloned().map(bulk));
    BytesFrame::Array(parts)
}

/// Build a RESP SEARCH request frame.
fn make_search(space: &str, terms: &[SearchTerm]) -> BytesFrame {
    let mut parts = Vec::with_capacity(terms.len() * 2 + 2);
    parts.push(BytesFrame::BulkString(Bytes::from_static(b"SEARCH")));
    parts.push(bulk_str(space));
    for term in terms {
        parts.push(bulk_str(&term.dimension.to_string()));
        parts.push(bulk(term.value.clone()));
    }
    BytesFrame::Array(parts)
}

/// Build a RESP SYNC request frame.
fn make_sync(space: &str) -> BytesFrame {
    BytesFrame::Array(vec![
        BytesFrame::BulkString(Bytes::from_static(b"SYNC")),
        bulk_str(space),
    ])
}

fn status_word(message: &str) -> &str {
    message.split_whitespace().next().unwrap_or_default()
}

/// Interpret a PUT reply as a [`WriteStatus`].
fn parse_put_response(resp: BytesFrame) -> WriteStatus {
    match resp {
        BytesFrame::SimpleString(s) if s.as_ref() == b"OK" => WriteStatus::Success,
        BytesFrame::Error(err) => match status_word(&err.to_string()) {
            "NOTFOUND" => WriteStatus::NotFound,
            "INVALID" => WriteStatus::Invalid,
            "ERR" | "ERROR" => WriteStatus::Error,
            _ => WriteStatus::Unrecognized,
        },
        _ => WriteStatus::Unrecognized,
    }
}

/// Interpret a SEARCH reply as the matched keys, in reply order.
fn parse_search_response(resp: BytesFrame) -> Result<Vec<Bytes>, StoreError> {
    match resp {
        BytesFrame::Array(items) => items
            .into_iter()
            .map(|item| match item {
                BytesFrame::BulkString(key) | BytesFrame::SimpleString(key) => Ok(key),
                other => Err(StoreError::Protocol(format!(
                    "unexpected search result entry: {other:?}"
                ))),
            })
            .collect(),
        BytesFrame::Null => Ok(Vec::new()),
        BytesFrame::Error(err) => Err(StoreError::Rejected {
            op: "search",
            message: err.to_string(),
        }),
        other => Err(StoreError::Protocol(format!(
            "unexpected SEARCH response: {other:?}"
        ))),
    }
}

/// Interpret a SYNC reply. Stores that do not know the command have no barrier.
fn parse_sync_response(resp: BytesFrame) -> Result<Barrier, StoreError> {
    match resp {
        BytesFrame::SimpleString(s) if s.as_ref() == b"OK" => Ok(Barrier::Acknowledged),
        BytesFrame::Error(err) => {
            let message = err.to_string();
            if message.to_ascii_lowercase().contains("unknown command") {
                Ok(Barrier::Unsupported)
            } else {
                Err(StoreError::Rejected { op: "sync", message })
            }
        }
        other => Err(StoreError::Protocol(format!(
            "unexpected SYNC response: {other:?}"
        ))),
    }
}
