//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Timeout for individual RESP read/write operations.
pub const RESP_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawned store process; killed on drop.
pub struct NodeProcess {
    pub child: Child,
}

impl NodeProcess {
    /// Panic if the process has already exited.
    pub fn assert_running(&mut self, context: &str) {
        if let Ok(Some(status)) = self.child.try_wait() {
            panic!("bitsearch-store exited early ({context}) with status {status}");
        }
    }
}

impl Drop for NodeProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// Spawn a store node declaring `spaces` (`name:dims`).
pub fn spawn_node(addr: SocketAddr, spaces: &[&str], propagation_delay: &str) -> NodeProcess {
    let mut cmd = Command::new(store_bin());
    cmd.arg("node")
        .arg("--listen")
        .arg(addr.to_string())
        .arg("--propagation-delay")
        .arg(propagation_delay)
        .env("RUST_LOG", "warn")
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    for space in spaces {
        cmd.arg("--space").arg(space);
    }
    let child = cmd.spawn().expect("failed to spawn bitsearch-store");
    NodeProcess { child }
}

/// Locate the bitsearch-store binary built by cargo.
pub fn store_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_bitsearch-store"))
}

/// Pick an available local port by binding to port 0.
pub fn pick_free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Wait for the RESP port to answer a PING.
pub fn wait_for_redis_ready(addr: SocketAddr, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if let Ok(stream) = TcpStream::connect(addr) {
            let mut conn = RespConn::from_stream(stream);
            if let Ok(Resp::Simple(s)) = conn.send_command(&["PING"]) {
                if s == "PONG" {
                    return true;
                }
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

/// Decoded RESP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resp {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Vec<Resp>),
}

/// RESP connection wrapper that preserves buffered reads between commands.
pub struct RespConn {
    reader: BufReader<TcpStream>,
}

impl RespConn {
    /// Connect to the RESP port with read/write timeouts.
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect redis");
        Self::from_stream(stream)
    }

    fn from_stream(stream: TcpStream) -> Self {
        stream.set_read_timeout(Some(RESP_TIMEOUT)).ok();
        stream.set_write_timeout(Some(RESP_TIMEOUT)).ok();
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Send a RESP command with bulk string arguments and decode the reply.
    pub fn send_command(&mut self, parts: &[&str]) -> std::io::Result<Resp> {
        let mut buf = Vec::new();
        buf.extend_from_slice(format!("*{}\r\n", parts.len()).as_bytes());
        for part in parts {
            buf.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
            buf.extend_from_slice(part.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        let stream = self.reader.get_mut();
        stream.write_all(&buf)?;
        stream.flush().ok();

        read_resp(&mut self.reader)
    }
}

fn read_line(reader: &mut BufReader<TcpStream>) -> std::io::Result<String> {
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    if line.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "stream closed",
        ));
    }
    Ok(String::from_utf8_lossy(&line).trim_end().to_string())
}

fn parse_len(text: &str) -> std::io::Result<i64> {
    text.parse::<i64>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
}

/// Parse one RESP reply, recursing into arrays.
fn read_resp(reader: &mut BufReader<TcpStream>) -> std::io::Result<Resp> {
    let mut first = [0u8; 1];
    reader.read_exact(&mut first)?;
    match first[0] {
        b'+' => Ok(Resp::Simple(read_line(reader)?)),
        b'-' => Ok(Resp::Error(read_line(reader)?)),
        b':' => Ok(Resp::Integer(parse_len(&read_line(reader)?)?)),
        b'$' => {
            let len = parse_len(&read_line(reader)?)?;
            if len < 0 {
                return Ok(Resp::Bulk(None));
            }
            let mut data = vec![0u8; len as usize + 2];
            reader.read_exact(&mut data)?;
            data.truncate(len as usize);
            Ok(Resp::Bulk(Some(data)))
        }
        b'*' => {
            let len = parse_len(&read_line(reader)?)?;
            let mut items = Vec::with_capacity(len.max(0) as usize);
            for _ in 0..len.max(0) {
                items.push(read_resp(reader)?);
            }
            Ok(Resp::Array(items))
        }
        other => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unexpected resp prefix {other}"),
        )),
    }
}
