//! RESP front end for [`SpaceStore`].
//!
//! Commands are RESP2 arrays of bulk strings:
//!
//! - `PING`
//! - `PUT <space> <key> <attr0> .. <attrN>`
//! - `SEARCH <space> [<dimension> <value>]...`
//! - `SYNC <space>`
//!
//! Space errors are reported with a status word (`NOTFOUND`, `INVALID`) as
//! the first token of the error reply, everything else uses `ERR`.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use redis_protocol::codec::Resp2;
use redis_protocol::resp2::types::{BytesFrame, Resp2Frame};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

use crate::space::{SpaceError, SpaceStore};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpaceOp {
    Ping,
    Put {
        space: String,
        key: Bytes,
        attributes: Vec<Bytes>,
    },
    Search {
        space: String,
        terms: Vec<(usize, Bytes)>,
    },
    Sync {
        space: String,
    },
}

/// Accept connections on an already bound listener until an accept fails.
pub async fn serve(listener: TcpListener, store: Arc<SpaceStore>) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true).ok();
        let store = store.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_conn(socket, store).await {
                tracing::debug!(%peer, error = ?err, "redis connection closed");
            }
        });
    }
}

async fn handle_conn(socket: TcpStream, store: Arc<SpaceStore>) -> anyhow::Result<()> {
    let mut framed = Framed::new(socket, Resp2::default());

    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let resp = match parse_command(frame) {
            Ok(op) => execute(&store, op).await,
            Err(err) => BytesFrame::Error(format!("ERR {err}").into()),
        };
        framed.send(resp).await?;
    }
    Ok(())
}

async fn execute(store: &SpaceStore, op: SpaceOp) -> BytesFrame {
    match op {
        SpaceOp::Ping => BytesFrame::SimpleString(Bytes::from_static(b"PONG")),
        SpaceOp::Put {
            space,
            key,
            attributes,
        } => match store.put(&space, key, attributes) {
            Ok(()) => ok_frame(),
            Err(err) => error_frame(&err),
        },
        SpaceOp::Search { space, terms } => match store.search(&space, &terms) {
            Ok(keys) => BytesFrame::Array(keys.into_iter().map(BytesFrame::BulkString).collect()),
            Err(err) => error_frame(&err),
        },
        SpaceOp::Sync { space } => {
            // Hold the reply until every write accepted before SYNC is searchable.
            let deadline = match store.settle_deadline(&space) {
                Ok(deadline) => deadline,
                Err(err) => return error_frame(&err),
            };
            if let Some(deadline) = deadline {
                tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            }
            match store.promote(&space) {
                Ok(()) => ok_frame(),
                Err(err) => error_frame(&err),
            }
        }
    }
}

fn ok_frame() -> BytesFrame {
    BytesFrame::SimpleString(Bytes::from_static(b"OK"))
}

fn error_frame(err: &SpaceError) -> BytesFrame {
    let status = match err {
        SpaceError::UnknownSpace(_) => "NOTFOUND",
        SpaceError::Arity { .. } | SpaceError::Dimension { .. } => "INVALID",
        SpaceError::DuplicateSpace(_) | SpaceError::NoDimensions(_) => "ERR",
    };
    BytesFrame::Error(format!("{status} {err}").into())
}

fn parse_command(frame: BytesFrame) -> anyhow::Result<SpaceOp> {
    let BytesFrame::Array(parts) = frame else {
        anyhow::bail!("expected array frame");
    };
    // Every frame gets a reply, so an empty array is an error rather than a no-op.
    anyhow::ensure!(!parts.is_empty(), "empty command");

    let cmd = frame_str_upper(&parts[0]).ok_or_else(|| anyhow::anyhow!("invalid command"))?;
    match cmd.as_str() {
        "PING" => {
            anyhow::ensure!(parts.len() == 1, "PING expects 0 arguments");
            Ok(SpaceOp::Ping)
        }
        "PUT" => {
            anyhow::ensure!(parts.len() >= 3, "PUT expects a space, a key and attributes");
            let space = frame_string(&parts[1]).ok_or_else(|| anyhow::anyhow!("invalid space"))?;
            let key = frame_bytes(&parts[2]).ok_or_else(|| anyhow::anyhow!("invalid key"))?;
            let attributes = parts[3..]
                .iter()
                .map(|part| frame_bytes(part).ok_or_else(|| anyhow::anyhow!("invalid attribute")))
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(SpaceOp::Put {
                space,
                key,
                attributes,
            })
        }
        "SEARCH" => {
            anyhow::ensure!(
                parts.len() >= 2 && parts.len() % 2 == 0,
                "SEARCH expects a space followed by dimension/value pairs"
            );
            let space = frame_string(&parts[1]).ok_or_else(|| anyhow::anyhow!("invalid space"))?;
            let terms = parts[2..]
                .chunks_exact(2)
                .map(|pair| {
                    let dimension = frame_string(&pair[0])
                        .and_then(|s| s.parse::<usize>().ok())
                        .ok_or_else(|| anyhow::anyhow!("invalid dimension"))?;
                    let value =
                        frame_bytes(&pair[1]).ok_or_else(|| anyhow::anyhow!("invalid value"))?;
                    Ok((dimension, value))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(SpaceOp::Search { space, terms })
        }
        "SYNC" => {
            anyhow::ensure!(parts.len() == 2, "SYNC expects 1 argument");
            let space = frame_string(&parts[1]).ok_or_else(|| anyhow::anyhow!("invalid space"))?;
            Ok(SpaceOp::Sync { space })
        }
        other => anyhow::bail!("unknown command {other}"),
    }
}

fn frame_str_upper(frame: &BytesFrame) -> Option<String> {
    frame.as_str().map(|s| s.to_ascii_uppercase())
}

fn frame_string(frame: &BytesFrame) -> Option<String> {
    frame.as_str().map(str::to_string)
}

fn frame_bytes(frame: &BytesFrame) -> Option<Bytes> {
    match frame {
        BytesFrame::BulkString(b) | BytesFrame::SimpleString(b) => Some(b.clone()),
        _ => None,
    }
}
