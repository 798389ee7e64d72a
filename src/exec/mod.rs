// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Sandboxed script execution.
//!
//! One request runs end to end: hazard gate, liveness, optional `before` snapshot, worker dispatch
//! under a wall-clock budget, optional `after` snapshot and diff, output truncation. Every outcome
//! is an [`ExecutionResult`] with an explicit status; connection faults become a recoverable
//! `fault` result and reset the session.
//!
//! A timed-out worker is abandoned, not stopped: the host may keep running the script after the
//! caller got its `timeout` result.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use schemars::JsonSchema;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::hazard;
use crate::host::{ExecError, HostConnection, RemoteSession, ScriptOutput, TransportError};
use crate::model::{SceneDiff, SceneSnapshot};
use crate::snapshot;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 100_000;
pub const DEFAULT_MAX_DIFF_NODES: usize = 1_000;
pub const BLOCKED_HINT: &str = "Set allow_dangerous=true to proceed with execution";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub code: String,
    pub allow_dangerous: bool,
    pub timeout: Duration,
    pub capture_diff: bool,
    pub max_stdout_bytes: usize,
    pub max_stderr_bytes: usize,
    pub max_diff_nodes: usize,
}

impl Default for ExecutionRequest {
    fn default() -> Self {
        Self {
            code: String::new(),
            allow_dangerous: false,
            timeout: DEFAULT_TIMEOUT,
            capture_diff: false,
            max_stdout_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_stderr_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_diff_nodes: DEFAULT_MAX_DIFF_NODES,
        }
    }
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into(), ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Blocked,
    Fault,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The script raised inside the host.
    Script,
    /// The host refused the request (unsupported operation, host-side error).
    Host,
    /// The channel to the host failed; the session was reset.
    Connection,
    /// The worker could not be started or vanished without a result.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct FaultInfo {
    pub kind: FaultKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    /// Whether retrying the same request can succeed once the session reconnects.
    pub recoverable: bool,
}

impl FaultInfo {
    fn connection(message: impl Into<String>) -> Self {
        Self { kind: FaultKind::Connection, message: message.into(), traceback: None, recoverable: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<SceneDiff>,
    pub diff_truncated: bool,
    /// Matched hazard descriptions in rule order; present on `blocked` and on overridden runs.
    pub dangerous_patterns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    fn with_status(status: ExecutionStatus) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: String::new(),
            stdout_truncated: false,
            stderr_truncated: false,
            diff: None,
            diff_truncated: false,
            dangerous_patterns: Vec::new(),
            fault: None,
            hint: None,
            warnings: Vec::new(),
            notes: Vec::new(),
            duration_ms: 0,
        }
    }

    fn fault(fault: FaultInfo) -> Self {
        Self { fault: Some(fault), ..Self::with_status(ExecutionStatus::Fault) }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Copies the captured streams in, truncating each to its byte cap.
    fn set_output(&mut self, output: &ScriptOutput, request: &ExecutionRequest) {
        let (stdout, stdout_truncated) = truncate_to_bytes(output.stdout(), request.max_stdout_bytes);
        let (stderr, stderr_truncated) = truncate_to_bytes(output.stderr(), request.max_stderr_bytes);
        if stdout_truncated {
            self.notes.push(format!("stdout truncated to {} bytes", stdout.len()));
        }
        if stderr_truncated {
            self.notes.push(format!("stderr truncated to {} bytes", stderr.len()));
        }
        self.stdout = stdout;
        self.stderr = stderr;
        self.stdout_truncated = stdout_truncated;
        self.stderr_truncated = stderr_truncated;
    }

    fn set_diff(&mut self, mut diff: SceneDiff, max_nodes: usize) {
        if diff.added.len() > max_nodes {
            let total = diff.added.len();
            diff.added.truncate(max_nodes);
            self.diff_truncated = true;
            self.notes.push(format!("diff truncated: showing {max_nodes} of {total} added nodes"));
        }
        self.diff = Some(diff);
    }
}

/// Cuts `text` to at most `cap` bytes without splitting a character.
pub fn truncate_to_bytes(mut text: String, cap: usize) -> (String, bool) {
    if text.len() <= cap {
        return (text, false);
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    (text, true)
}

enum Dispatch {
    Finished(Result<(), ExecError>),
    TimedOut,
    Lost(String),
}

fn dispatch(
    conn: Arc<dyn HostConnection>,
    code: &str,
    output: Arc<ScriptOutput>,
    timeout: Duration,
) -> Dispatch {
    let (tx, rx) = mpsc::channel();
    let code = code.to_owned();
    let spawned = thread::Builder::new().name("houdini-exec".to_owned()).spawn(move || {
        let result = conn.exec(&code, &output);
        // The caller may have stopped waiting.
        let _ = tx.send(result);
    });
    if let Err(err) = spawned {
        return Dispatch::Lost(format!("failed to start worker: {err}"));
    }
    match rx.recv_timeout(timeout) {
        Ok(result) => Dispatch::Finished(result),
        Err(RecvTimeoutError::Timeout) => Dispatch::TimedOut,
        Err(RecvTimeoutError::Disconnected) => {
            Dispatch::Lost("worker exited without a result".to_owned())
        }
    }
}

fn take_snapshot(
    session: &RemoteSession,
    conn: &Arc<dyn HostConnection>,
    root: &str,
    phase: &str,
) -> Result<SceneSnapshot, FaultInfo> {
    snapshot::snapshot(conn.as_ref(), root).map_err(|err| {
        classify_fault(session, conn, &err, format!("{phase} snapshot failed: {err}"))
    })
}

/// Runs one request against the session.
pub fn execute(session: &RemoteSession, root: &str, request: &ExecutionRequest) -> ExecutionResult {
    let started = Instant::now();
    let mut result = run(session, root, request);
    result.duration_ms = started.elapsed().as_millis() as u64;
    result
}

fn run(session: &RemoteSession, root: &str, request: &ExecutionRequest) -> ExecutionResult {
    if request.code.trim().is_empty() {
        return ExecutionResult::with_status(ExecutionStatus::Success);
    }

    let hazards = hazard::scan_descriptions(&request.code);
    if !hazards.is_empty() && !request.allow_dangerous {
        info!(patterns = hazards.len(), "script blocked by hazard scan");
        return ExecutionResult {
            dangerous_patterns: hazards,
            hint: Some(BLOCKED_HINT.to_owned()),
            ..ExecutionResult::with_status(ExecutionStatus::Blocked)
        };
    }

    let conn = match session.ensure_live() {
        Ok(conn) => conn,
        Err(err) => return ExecutionResult::fault(FaultInfo::connection(err.to_string())),
    };

    let before = if request.capture_diff {
        match take_snapshot(session, &conn, root, "before") {
            Ok(snapshot) => Some(snapshot),
            Err(fault) => return ExecutionResult::fault(fault),
        }
    } else {
        None
    };

    let output = ScriptOutput::new();
    debug!(bytes = request.code.len(), timeout = ?request.timeout, "dispatching script");
    let outcome = dispatch(conn.clone(), &request.code, output.clone(), request.timeout);

    let mut result = match outcome {
        Dispatch::TimedOut => {
            warn!(timeout = ?request.timeout, "script timed out; worker left running");
            let mut result = ExecutionResult::with_status(ExecutionStatus::Timeout);
            result.warnings.push(format!(
                "Execution exceeded {:.1}s; the code may still be running in Houdini",
                request.timeout.as_secs_f64()
            ));
            result
        }
        Dispatch::Lost(message) => ExecutionResult::fault(FaultInfo {
            kind: FaultKind::Internal,
            message,
            traceback: None,
            recoverable: false,
        }),
        Dispatch::Finished(Err(ExecError::Script { message, traceback })) => {
            debug!(%message, "script raised");
            ExecutionResult::fault(FaultInfo {
                kind: FaultKind::Script,
                message,
                traceback: Some(traceback),
                recoverable: false,
            })
        }
        Dispatch::Finished(Err(ExecError::Transport(err))) => {
            ExecutionResult::fault(classify_fault(session, &conn, &err, err.to_string()))
        }
        Dispatch::Finished(Ok(())) => {
            let mut result = ExecutionResult::with_status(ExecutionStatus::Success);
            if let Some(before) = before {
                match take_snapshot(session, &conn, root, "after") {
                    Ok(after) => result.set_diff(snapshot::diff(&before, &after), request.max_diff_nodes),
                    Err(fault) => result = ExecutionResult::fault(fault),
                }
            }
            result
        }
    };

    result.set_output(&output, request);
    if !hazards.is_empty() {
        result.warnings.push(format!(
            "Executed code containing dangerous patterns: {}",
            hazards.join(", ")
        ));
        result.dangerous_patterns = hazards;
    }
    result
}

/// Connection faults reset the session and are recoverable; host answers leave it up.
fn classify_fault(
    session: &RemoteSession,
    conn: &Arc<dyn HostConnection>,
    err: &TransportError,
    message: String,
) -> FaultInfo {
    if session.report_fault(conn, err) {
        FaultInfo::connection(message)
    } else {
        FaultInfo { kind: FaultKind::Host, message, traceback: None, recoverable: false }
    }
}
