// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Boundary to the host application process.
//!
//! A [`Transport`] opens [`HostConnection`]s; the [`session::RemoteSession`] owns the single live
//! connection of the process. Concrete transports: [`wire::LineTransport`] (TCP, line-delimited
//! JSON) and [`memory::MemoryHost`] (in-process graph for tests and `--demo`).

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::model::{HostValue, NodeStub, NodeTypeEntry};

pub mod memory;
pub mod session;
pub mod wire;

pub use session::{ConnectionError, ConnectionInfo, RemoteSession, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("connection reset: {0}")]
    Reset(String),
    #[error("connection closed by host")]
    Closed,
    #[error("host did not answer within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("operation not supported by this transport: {0}")]
    Unsupported(&'static str),
    #[error("host error: {0}")]
    Host(String),
}

impl TransportError {
    /// Whether the connection that produced this error must be torn down.
    ///
    /// `Unsupported` and `Host` are answers to a well-formed request; everything else leaves the
    /// channel in an unknown state.
    pub fn is_connection_fault(&self) -> bool {
        !matches!(self, Self::Unsupported(_) | Self::Host(_))
    }

    /// Short machine-readable label used in tool responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Refused(_) => "refused",
            Self::Reset(_) => "reset",
            Self::Closed => "closed",
            Self::Timeout(_) => "timeout",
            Self::Io(_) => "io",
            Self::Protocol(_) => "protocol",
            Self::Unsupported(_) => "unsupported",
            Self::Host(_) => "host",
        }
    }
}

/// Failure of a script evaluated on the host.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The script itself raised; `traceback` is the host's full diagnostic text.
    #[error("{message}")]
    Script { message: String, traceback: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Growable stdout/stderr buffers a running script writes into.
///
/// Shared between the worker evaluating the script and the caller, which may read partial output
/// while the script is still running.
#[derive(Debug, Default)]
pub struct ScriptOutput {
    stdout: Mutex<String>,
    stderr: Mutex<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl ScriptOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn write(&self, stream: Stream, text: &str) {
        let buffer = match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        };
        buffer.lock().unwrap_or_else(PoisonError::into_inner).push_str(text);
    }

    pub fn stdout(&self) -> String {
        self.stdout.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn stderr(&self) -> String {
        self.stderr.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Opens connections to a host process.
pub trait Transport: Send + Sync {
    fn open(&self, host: &str, port: u16) -> Result<Arc<dyn HostConnection>, TransportError>;
}

/// One open channel to the host.
///
/// Methods are the operations the core issues; each is one request/response round trip.
/// Implementations must tolerate concurrent calls from several threads.
pub trait HostConnection: Send + Sync {
    /// Application version string; the cheap liveness probe.
    fn version(&self) -> Result<String, TransportError>;

    /// Path of the scene file currently loaded in the host.
    fn hip_file(&self) -> Result<String, TransportError>;

    fn node_exists(&self, path: &str) -> Result<bool, TransportError>;

    /// Direct children of `path` in the host's listing order.
    fn list_children(&self, path: &str) -> Result<Vec<NodeStub>, TransportError>;

    /// Runs a textual host command and returns its standard output.
    fn hscript(&self, _command: &str) -> Result<String, TransportError> {
        Err(TransportError::Unsupported("hscript"))
    }

    /// Evaluates `code` with the session bound into its context, streaming output into `output`.
    fn exec(&self, code: &str, output: &ScriptOutput) -> Result<(), ExecError>;

    /// [`exec`](Self::exec) for short host-side queries, bounded like every other call.
    fn exec_query(&self, code: &str, output: &ScriptOutput) -> Result<(), ExecError> {
        self.exec(code, output)
    }

    fn node_type_categories(&self) -> Result<Vec<String>, TransportError>;

    fn node_types(&self, category: &str) -> Result<Vec<NodeTypeEntry>, TransportError>;

    fn parameters(&self, path: &str) -> Result<Vec<(String, HostValue)>, TransportError>;

    fn load_file(&self, path: &str) -> Result<(), TransportError>;

    fn new_file(&self) -> Result<(), TransportError>;

    fn close(&self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_answers_are_not_connection_faults() {
        assert!(!TransportError::Unsupported("hscript").is_connection_fault());
        assert!(!TransportError::Host("node not found".into()).is_connection_fault());
        assert!(TransportError::Closed.is_connection_fault());
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_connection_fault());
        assert!(TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_connection_fault());
    }

    #[test]
    fn script_output_accumulates_per_stream() {
        let output = ScriptOutput::new();
        output.write(Stream::Stdout, "a");
        output.write(Stream::Stderr, "err");
        output.write(Stream::Stdout, "b");
        assert_eq!(output.stdout(), "ab");
        assert_eq!(output.stderr(), "err");
    }
}
