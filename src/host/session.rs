// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{HostConnection, Transport, TransportError};

/// Node probed after connecting; its absence is reported but tolerated.
const SANITY_PROBE_PATH: &str = "/obj";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of open attempts; values below 1 are treated as 1.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Pause after failed attempt `attempt` (1-based): `base_delay * 2^(attempt-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

#[derive(Debug, thiserror::Error)]
#[error(
    "failed to connect to Houdini at {host}:{port} after {attempts} attempts; \
     make sure Houdini is running with its RPC server listening (last error: {last})"
)]
pub struct ConnectionError {
    pub host: String,
    pub port: u16,
    pub attempts: u32,
    #[source]
    pub last: TransportError,
}

/// Connection status as reported to clients; never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub houdini_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hip_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The process-wide session with the host.
///
/// Holds at most one live connection. Callers obtain it through [`RemoteSession::ensure_live`],
/// which probes the cached connection and reconnects once when the probe fails.
pub struct RemoteSession {
    transport: Arc<dyn Transport>,
    host: String,
    port: u16,
    policy: RetryPolicy,
    live: RwLock<Option<Arc<dyn HostConnection>>>,
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("policy", &self.policy)
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn same_connection(a: &Arc<dyn HostConnection>, b: &Arc<dyn HostConnection>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl RemoteSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        host: impl Into<String>,
        port: u16,
        policy: RetryPolicy,
    ) -> Self {
        Self { transport, host: host.into(), port, policy, live: RwLock::new(None) }
    }

    pub fn is_connected(&self) -> bool {
        self.current().is_some()
    }

    /// The cached connection, without probing it.
    pub fn current(&self) -> Option<Arc<dyn HostConnection>> {
        self.live.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn connect(&self) -> Result<Arc<dyn HostConnection>, ConnectionError> {
        self.connect_with(self.policy)
    }

    /// Opens a fresh connection, retrying with exponential backoff.
    ///
    /// There is no pause after the final attempt. On success the new connection replaces any
    /// cached one.
    pub fn connect_with(
        &self,
        policy: RetryPolicy,
    ) -> Result<Arc<dyn HostConnection>, ConnectionError> {
        let attempts = policy.attempts();
        let mut last = None;

        for attempt in 1..=attempts {
            info!(host = %self.host, port = self.port, attempt, attempts, "connecting to Houdini");
            match self.open_validated() {
                Ok(conn) => {
                    let previous = self
                        .live
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .replace(conn.clone());
                    if let Some(previous) = previous {
                        let _ = previous.close();
                    }
                    return Ok(conn);
                }
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "connection attempt failed");
                    last = Some(err);
                    if attempt < attempts {
                        let delay = policy.delay_after(attempt);
                        debug!(?delay, "backing off before next attempt");
                        thread::sleep(delay);
                    }
                }
            }
        }

        let last = last.unwrap_or(TransportError::Closed);
        error!(host = %self.host, port = self.port, attempts, error = %last, "giving up on Houdini");
        Err(ConnectionError { host: self.host.clone(), port: self.port, attempts, last })
    }

    fn open_validated(&self) -> Result<Arc<dyn HostConnection>, TransportError> {
        let conn = self.transport.open(&self.host, self.port)?;
        let validated = conn.version().and_then(|version| {
            info!(%version, "connected to Houdini");
            if !conn.node_exists(SANITY_PROBE_PATH)? {
                warn!(path = SANITY_PROBE_PATH, "connected, but the object context is missing");
            }
            Ok(())
        });
        match validated {
            Ok(()) => Ok(conn),
            Err(err) => {
                let _ = conn.close();
                Err(err)
            }
        }
    }

    /// Returns a connection that answered a liveness probe just now.
    ///
    /// A cached connection that fails the probe is dropped and replaced by a fresh one.
    pub fn ensure_live(&self) -> Result<Arc<dyn HostConnection>, ConnectionError> {
        match self.current() {
            None => self.connect(),
            Some(conn) => match conn.version() {
                Ok(_) => Ok(conn),
                Err(err) => {
                    warn!(error = %err, "liveness probe failed; reconnecting");
                    self.drop_connection(&conn);
                    self.connect()
                }
            },
        }
    }

    /// Closes and forgets the cached connection. Close errors are logged, never raised.
    pub fn disconnect(&self) {
        let previous = self.live.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(conn) = previous {
            if let Err(err) = conn.close() {
                debug!(error = %err, "error while closing connection");
            }
            info!("disconnected from Houdini");
        }
    }

    /// Forgets `conn` if it is still the cached connection.
    pub fn drop_connection(&self, conn: &Arc<dyn HostConnection>) {
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        if live.as_ref().is_some_and(|current| same_connection(current, conn)) {
            *live = None;
            drop(live);
            if let Err(err) = conn.close() {
                debug!(error = %err, "error while closing dropped connection");
            }
        }
    }

    /// Tears the connection down if `err` left it in an unknown state.
    ///
    /// Returns whether the session was reset.
    pub fn report_fault(&self, conn: &Arc<dyn HostConnection>, err: &TransportError) -> bool {
        if !err.is_connection_fault() {
            return false;
        }
        error!(kind = err.kind(), error = %err, "connection fault; resetting session");
        self.drop_connection(conn);
        true
    }

    /// Current status; probes the cached connection but never reconnects.
    pub fn info(&self) -> ConnectionInfo {
        let mut info = ConnectionInfo {
            host: self.host.clone(),
            port: self.port,
            connected: false,
            houdini_version: None,
            hip_file: None,
            error: None,
        };
        let Some(conn) = self.current() else {
            return info;
        };
        match conn.version() {
            Ok(version) => {
                info.connected = true;
                info.houdini_version = Some(version);
                info.hip_file = conn.hip_file().ok();
            }
            Err(err) => {
                self.report_fault(&conn, &err);
                info.error = Some(err.to_string());
            }
        }
        info
    }
}
