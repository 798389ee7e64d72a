// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Tool calls over a real socket: `HoudiniMcp` -> `LineTransport` -> a line-JSON bridge serving a
//! `MemoryHost`.

use super::*;

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::exec::{ExecutionStatus, FaultKind};
use crate::host::memory::MemoryHost;
use crate::host::{ExecError, HostConnection, ScriptOutput, Transport, TransportError};

fn new_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().expect("tokio runtime")
}

fn encode<T: Serialize>(result: Result<T, TransportError>) -> Result<Value, TransportError> {
    result.and_then(|value| {
        serde_json::to_value(value).map_err(|err| TransportError::Protocol(err.to_string()))
    })
}

/// Final frame for a non-exec op; `None` when the bridge must drop the socket.
fn reply(id: &Value, result: Result<Value, TransportError>) -> Option<Value> {
    match result {
        Ok(value) => Some(json!({ "id": id, "ok": value })),
        Err(TransportError::Unsupported(op)) => {
            Some(json!({ "id": id, "error": { "kind": "unsupported", "message": op } }))
        }
        Err(err) if err.is_connection_fault() => None,
        Err(err) => Some(json!({ "id": id, "error": { "kind": "host", "message": err.to_string() } })),
    }
}

fn dispatch(conn: &dyn HostConnection, request: &Value) -> Option<Vec<Value>> {
    let id = &request["id"];
    let arg = |key: &str| request[key].as_str().unwrap_or_default().to_owned();
    let result = match request["op"].as_str().unwrap_or_default() {
        "version" => encode(conn.version()),
        "hip_file" => encode(conn.hip_file()),
        "node_exists" => encode(conn.node_exists(&arg("path"))),
        "list_children" => encode(conn.list_children(&arg("path"))),
        "hscript" => encode(conn.hscript(&arg("command"))),
        "node_type_categories" => encode(conn.node_type_categories()),
        "node_types" => encode(conn.node_types(&arg("category"))),
        "parameters" => encode(conn.parameters(&arg("path"))),
        "load_file" => encode(conn.load_file(&arg("path"))),
        "new_file" => encode(conn.new_file()),
        "exec" => return exec_frames(conn, id, &arg("code")),
        other => Err(TransportError::Protocol(format!("unknown op {other}"))),
    };
    reply(id, result).map(|frame| vec![frame])
}

fn exec_frames(conn: &dyn HostConnection, id: &Value, code: &str) -> Option<Vec<Value>> {
    let output = ScriptOutput::new();
    let result = conn.exec(code, &output);
    let mut frames = Vec::new();
    for (stream, data) in [("stdout", output.stdout()), ("stderr", output.stderr())] {
        if !data.is_empty() {
            frames.push(json!({ "id": id, "stream": stream, "data": data }));
        }
    }
    let last = match result {
        Ok(()) => json!({ "id": id, "ok": null }),
        Err(ExecError::Script { message, traceback }) => json!({
            "id": id,
            "error": { "kind": "script", "message": message, "traceback": traceback },
        }),
        Err(ExecError::Transport(err)) => reply(id, Err(err))?,
    };
    frames.push(last);
    Some(frames)
}

fn serve_connection(host: &MemoryHost, stream: TcpStream) {
    let Ok(conn) = host.open("bridge", 0) else { return };
    let Ok(mut writer) = stream.try_clone() else { return };
    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else { break };
        let Ok(request) = serde_json::from_str::<Value>(&line) else { break };
        let Some(frames) = dispatch(conn.as_ref(), &request) else { break };
        for frame in frames {
            if writeln!(writer, "{frame}").is_err() {
                return;
            }
        }
    }
}

/// Serves `host` on an ephemeral port; every accepted socket gets its own host connection.
fn spawn_bridge(host: &MemoryHost) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let host = host.clone();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let host = host.clone();
            thread::spawn(move || serve_connection(&host, stream));
        }
    });
    port
}

fn tcp_server(host: &MemoryHost) -> HoudiniMcp {
    let config = Config {
        host: "127.0.0.1".to_owned(),
        port: spawn_bridge(host),
        max_retries: 2,
        retry_delay: Duration::from_millis(5),
        call_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(1),
        ..Config::default()
    };
    HoudiniMcp::new(Houdini::connect_tcp(&config))
}

fn execute(code: &str, capture_diff: bool) -> ExecuteParams {
    ExecuteParams {
        code: code.to_owned(),
        allow_dangerous: None,
        timeout_seconds: Some(5.0),
        capture_diff: Some(capture_diff),
        max_stdout_bytes: None,
        max_stderr_bytes: None,
        max_diff_nodes: None,
    }
}

#[test]
fn execute_streams_output_and_diffs_over_tcp() {
    let rt = new_runtime();
    let host = MemoryHost::demo();
    let server = tcp_server(&host);

    rt.block_on(async {
        let Json(result) = server
            .code_execute(Parameters(execute(
                "print building\ncreate /obj geo scatter\neprint careful",
                true,
            )))
            .await
            .expect("execute");
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.stdout, "building\n");
        assert_eq!(result.stderr, "careful\n");
        let diff = result.diff.expect("diff");
        assert_eq!(diff.added, vec!["/obj/scatter".to_owned()]);
        assert!(diff.removed.is_empty());

        let Json(info) = server.connection_status().await.expect("status");
        assert!(info.connected);
        assert_eq!(info.houdini_version.as_deref(), Some("20.5.123"));
    });
}

#[test]
fn script_faults_cross_the_wire_with_traceback() {
    let rt = new_runtime();
    let host = MemoryHost::demo();
    let server = tcp_server(&host);

    rt.block_on(async {
        let Json(result) = server
            .code_execute(Parameters(execute("print partial\nfail bad input", false)))
            .await
            .expect("execute");
        assert_eq!(result.status, ExecutionStatus::Fault);
        assert_eq!(result.stdout, "partial\n");
        let fault = result.fault.expect("fault");
        assert_eq!(fault.kind, FaultKind::Script);
        assert!(!fault.recoverable);
        assert!(fault.traceback.expect("traceback").contains("line 2"));

        let Json(info) = server.connection_status().await.expect("status");
        assert!(info.connected, "a script fault must not drop the session");
    });
}

#[test]
fn snapshot_is_identical_with_and_without_bulk_listing() {
    let rt = new_runtime();
    let host = MemoryHost::demo();
    let server = tcp_server(&host);

    rt.block_on(async {
        let Json(bulk) =
            server.scene_snapshot(Parameters(RootParams::default())).await.expect("bulk");
        host.set_hscript_supported(false);
        let Json(walked) =
            server.scene_snapshot(Parameters(RootParams::default())).await.expect("walk");
        assert_eq!(bulk.snapshot, walked.snapshot);
        assert_eq!(walked.node_count, 8);
    });
}

#[test]
fn severed_host_is_reconnected_on_next_call() {
    let rt = new_runtime();
    let host = MemoryHost::demo();
    let server = tcp_server(&host);

    rt.block_on(async {
        server.scene_snapshot(Parameters(RootParams::default())).await.expect("first");
        let opens = host.open_attempts();
        host.sever();

        let Json(after) =
            server.scene_snapshot(Parameters(RootParams::default())).await.expect("after sever");
        assert_eq!(after.node_count, 8);
        assert!(host.open_attempts() > opens);
    });
}

#[test]
fn catalogue_and_parameters_decode_from_json() {
    let rt = new_runtime();
    let host = MemoryHost::demo();
    let server = tcp_server(&host);

    rt.block_on(async {
        let Json(page) = server
            .node_types_list(Parameters(NodeTypesParams {
                category: Some("driver".to_owned()),
                ..NodeTypesParams::default()
            }))
            .await
            .expect("types");
        let names: Vec<_> = page.items.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["karma", "ifd"]);

        let Json(response) = server
            .node_parameters(Parameters(NodePathParams { path: "/obj/terrain/grid1".to_owned() }))
            .await
            .expect("parameters");
        let size = response.parameters.iter().find(|parameter| parameter.name == "size");
        assert_eq!(size.expect("size").value, json!([100.0, 100.0]));
    });
}
