// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Line-delimited JSON over TCP.
//!
//! Each request is one line `{"id": n, "op": "...", ...args}`. The host answers with one final
//! frame per request, either `{"id": n, "ok": value}` or
//! `{"id": n, "error": {"kind": "unsupported"|"script"|"host", "message": "...", "traceback": "..."}}`.
//! While a script runs the host may interleave `{"id": n, "stream": "stdout"|"stderr", "data": "..."}`
//! frames ahead of the final one.
//!
//! A reader thread routes frames to the waiting caller by id, so several calls can be in flight on
//! one socket.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::{ExecError, HostConnection, ScriptOutput, Stream, Transport, TransportError};
use crate::model::{HostValue, NodeStub, NodeTypeEntry};

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Op<'a> {
    Version,
    HipFile,
    NodeExists { path: &'a str },
    ListChildren { path: &'a str },
    Hscript { command: &'a str },
    Exec { code: &'a str },
    NodeTypeCategories,
    NodeTypes { category: &'a str },
    Parameters { path: &'a str },
    LoadFile { path: &'a str },
    NewFile,
}

impl Op<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::HipFile => "hip_file",
            Self::NodeExists { .. } => "node_exists",
            Self::ListChildren { .. } => "list_children",
            Self::Hscript { .. } => "hscript",
            Self::Exec { .. } => "exec",
            Self::NodeTypeCategories => "node_type_categories",
            Self::NodeTypes { .. } => "node_types",
            Self::Parameters { .. } => "parameters",
            Self::LoadFile { .. } => "load_file",
            Self::NewFile => "new_file",
        }
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    #[serde(flatten)]
    op: Op<'a>,
}

#[derive(Debug, Deserialize)]
struct Frame {
    id: u64,
    #[serde(default)]
    ok: Value,
    #[serde(default)]
    error: Option<RemoteError>,
    #[serde(default)]
    stream: Option<Stream>,
    #[serde(default)]
    data: String,
}

impl Frame {
    fn is_final(&self) -> bool {
        self.stream.is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RemoteErrorKind {
    Unsupported,
    Script,
    Host,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    kind: RemoteErrorKind,
    message: String,
    #[serde(default)]
    traceback: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Opens line-JSON connections over TCP.
#[derive(Debug, Clone, Copy)]
pub struct LineTransport {
    pub connect_timeout: Duration,
    /// Bound on every call except script execution, which waits for the host.
    pub call_timeout: Duration,
}

impl Default for LineTransport {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(5), call_timeout: Duration::from_secs(30) }
    }
}

impl Transport for LineTransport {
    fn open(&self, host: &str, port: u16) -> Result<Arc<dyn HostConnection>, TransportError> {
        let addrs = (host, port).to_socket_addrs()?;
        let mut last = TransportError::Refused(format!("{host}:{port} did not resolve"));
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    debug!(%addr, "socket connected");
                    return Ok(Arc::new(LineConnection::start(stream, self.call_timeout)?));
                }
                Err(err) if err.kind() == ErrorKind::ConnectionRefused => {
                    last = TransportError::Refused(addr.to_string());
                }
                Err(err) if err.kind() == ErrorKind::TimedOut => {
                    last = TransportError::Timeout(self.connect_timeout);
                }
                Err(err) => last = TransportError::Io(err),
            }
        }
        Err(last)
    }
}

#[derive(Debug, Default)]
struct Pending {
    waiters: Mutex<HashMap<u64, Sender<Frame>>>,
    closed: AtomicBool,
}

impl Pending {
    fn route(&self, frame: Frame) {
        let mut waiters = lock(&self.waiters);
        let sender = if frame.is_final() {
            waiters.remove(&frame.id)
        } else {
            waiters.get(&frame.id).cloned()
        };
        match sender {
            // A send error means the caller already gave up on this id.
            Some(sender) => {
                let _ = sender.send(frame);
            }
            None => trace!(id = frame.id, "dropping frame for unknown request"),
        }
    }

    /// Registers a caller for `id`; fails once the connection is closed.
    ///
    /// The closed flag is read under the waiters lock so a concurrent `fail_all` either sees the
    /// new sender and drops it, or this call sees the flag.
    fn register(&self, id: u64) -> Result<Receiver<Frame>, TransportError> {
        let mut waiters = lock(&self.waiters);
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let (tx, rx) = mpsc::channel();
        waiters.insert(id, tx);
        Ok(rx)
    }

    fn fail_all(&self) {
        let mut waiters = lock(&self.waiters);
        self.closed.store(true, Ordering::SeqCst);
        waiters.clear();
    }
}

struct LineConnection {
    writer: Mutex<TcpStream>,
    pending: Arc<Pending>,
    next_id: AtomicU64,
    call_timeout: Duration,
}

impl LineConnection {
    fn start(stream: TcpStream, call_timeout: Duration) -> Result<Self, TransportError> {
        stream.set_nodelay(true)?;
        let reader = stream.try_clone()?;
        let pending = Arc::new(Pending::default());
        let routed = pending.clone();
        thread::Builder::new()
            .name("houdini-wire-reader".to_owned())
            .spawn(move || read_frames(reader, &routed))?;
        Ok(Self { writer: Mutex::new(stream), pending, next_id: AtomicU64::new(1), call_timeout })
    }

    fn round_trip(
        &self,
        op: Op<'_>,
        output: Option<&ScriptOutput>,
        wait: Option<Duration>,
    ) -> Result<Value, ExecError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let op_name = op.name();
        let mut line = serde_json::to_string(&Request { id, op })
            .map_err(|err| TransportError::Protocol(err.to_string()))?;
        line.push('\n');

        let rx = self.pending.register(id)?;
        {
            let mut writer = lock(&self.writer);
            if let Err(err) = writer.write_all(line.as_bytes()).and_then(|()| writer.flush()) {
                lock(&self.pending.waiters).remove(&id);
                return Err(TransportError::Io(err).into());
            }
        }
        trace!(id, op = op_name, "request sent");

        let deadline = wait.map(|limit| (Instant::now() + limit, limit));
        loop {
            let received = match deadline {
                Some((at, limit)) => rx
                    .recv_timeout(at.saturating_duration_since(Instant::now()))
                    .map_err(|err| match err {
                        RecvTimeoutError::Timeout => TransportError::Timeout(limit),
                        RecvTimeoutError::Disconnected => TransportError::Closed,
                    }),
                None => rx.recv().map_err(|_| TransportError::Closed),
            };
            let frame = match received {
                Ok(frame) => frame,
                Err(err) => {
                    lock(&self.pending.waiters).remove(&id);
                    return Err(err.into());
                }
            };

            if let Some(stream) = frame.stream {
                if let Some(output) = output {
                    output.write(stream, &frame.data);
                }
                continue;
            }

            return match frame.error {
                None => Ok(frame.ok),
                Some(remote) => Err(match remote.kind {
                    RemoteErrorKind::Unsupported => TransportError::Unsupported(op_name).into(),
                    RemoteErrorKind::Host => TransportError::Host(remote.message).into(),
                    RemoteErrorKind::Script => ExecError::Script {
                        message: remote.message,
                        traceback: remote.traceback.unwrap_or_default(),
                    },
                }),
            };
        }
    }

    fn call<T: DeserializeOwned>(&self, op: Op<'_>) -> Result<T, TransportError> {
        let value = self.round_trip(op, None, Some(self.call_timeout)).map_err(|err| match err {
            ExecError::Transport(err) => err,
            ExecError::Script { message, .. } => TransportError::Host(message),
        })?;
        serde_json::from_value(value).map_err(|err| TransportError::Protocol(err.to_string()))
    }
}

impl Drop for LineConnection {
    fn drop(&mut self) {
        let _ = lock(&self.writer).shutdown(Shutdown::Both);
    }
}

fn read_frames(stream: TcpStream, pending: &Pending) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                debug!(error = %err, "wire read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Frame>(&line) {
            Ok(frame) => pending.route(frame),
            Err(err) => warn!(error = %err, "discarding malformed frame"),
        }
    }
    debug!("wire reader finished; failing pending calls");
    pending.fail_all();
}

impl HostConnection for LineConnection {
    fn version(&self) -> Result<String, TransportError> {
        self.call(Op::Version)
    }

    fn hip_file(&self) -> Result<String, TransportError> {
        self.call(Op::HipFile)
    }

    fn node_exists(&self, path: &str) -> Result<bool, TransportError> {
        self.call(Op::NodeExists { path })
    }

    fn list_children(&self, path: &str) -> Result<Vec<NodeStub>, TransportError> {
        self.call(Op::ListChildren { path })
    }

    fn hscript(&self, command: &str) -> Result<String, TransportError> {
        self.call(Op::Hscript { command })
    }

    fn exec(&self, code: &str, output: &ScriptOutput) -> Result<(), ExecError> {
        self.round_trip(Op::Exec { code }, Some(output), None).map(|_| ())
    }

    fn exec_query(&self, code: &str, output: &ScriptOutput) -> Result<(), ExecError> {
        self.round_trip(Op::Exec { code }, Some(output), Some(self.call_timeout)).map(|_| ())
    }

    fn node_type_categories(&self) -> Result<Vec<String>, TransportError> {
        self.call(Op::NodeTypeCategories)
    }

    fn node_types(&self, category: &str) -> Result<Vec<NodeTypeEntry>, TransportError> {
        self.call(Op::NodeTypes { category })
    }

    fn parameters(&self, path: &str) -> Result<Vec<(String, HostValue)>, TransportError> {
        self.call(Op::Parameters { path })
    }

    fn load_file(&self, path: &str) -> Result<(), TransportError> {
        self.call::<Value>(Op::LoadFile { path }).map(|_| ())
    }

    fn new_file(&self) -> Result<(), TransportError> {
        self.call::<Value>(Op::NewFile).map(|_| ())
    }

    fn close(&self) -> Result<(), TransportError> {
        self.pending.fail_all();
        lock(&self.writer).shutdown(Shutdown::Both)?;
        Ok(())
    }
}
