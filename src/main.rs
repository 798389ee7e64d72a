// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Houdini MCP CLI entrypoint.
//!
//! By default this serves MCP over stdio (intended for tool integrations). Use `--http-port` to
//! serve streamable HTTP at `http://127.0.0.1:<port>/mcp` instead.
//!
//! `--demo` swaps the TCP connection to Houdini for an in-memory scene.

use std::error::Error;
use std::sync::Arc;

use axum::Router;
use houdini_mcp::host::memory::MemoryHost;
use houdini_mcp::mcp::HoudiniMcp;
use houdini_mcp::{logging, Config, Houdini};
use rmcp::transport::{
    streamable_http_server::session::local::LocalSessionManager, StreamableHttpServerConfig,
    StreamableHttpService,
};
use tracing::{error, info};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--host <host>] [--port <port>] [--http-port <port>]\n  {program} --demo [--http-port <port>]\n\nServes MCP over stdio unless --http-port is given (0 = ephemeral), in which case it serves\nstreamable HTTP at `http://127.0.0.1:<port>/mcp`.\n\n--host/--port select the Houdini bridge (default localhost:18811) and override HOUDINI_HOST and\nHOUDINI_PORT.\n--demo uses a built-in in-memory scene and cannot be combined with --host/--port."
    );
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CliOptions {
    demo: bool,
    host: Option<String>,
    port: Option<u16>,
    http_port: Option<u16>,
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<CliOptions, ()> {
    let mut options = CliOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--demo" => {
                if options.demo {
                    return Err(());
                }
                options.demo = true;
            }
            "--host" => {
                if options.host.is_some() {
                    return Err(());
                }
                let host = args.next().ok_or(())?;
                if host.trim().is_empty() || host.starts_with('-') {
                    return Err(());
                }
                options.host = Some(host);
            }
            "--port" => {
                if options.port.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let port: u16 = raw.parse().map_err(|_| ())?;
                if port == 0 {
                    return Err(());
                }
                options.port = Some(port);
            }
            "--http-port" => {
                if options.http_port.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let port: u16 = raw.parse().map_err(|_| ())?;
                options.http_port = Some(port);
            }
            _ => return Err(()),
        }
    }

    if options.demo && (options.host.is_some() || options.port.is_some()) {
        return Err(());
    }

    Ok(options)
}

/// Environment config with CLI overrides applied.
fn resolve_config(options: &CliOptions, mut config: Config) -> Config {
    if let Some(host) = &options.host {
        config.host = host.clone();
    }
    if let Some(port) = options.port {
        config.port = port;
    }
    config
}

async fn serve_http(mcp: HoudiniMcp, port: u16) -> Result<(), Box<dyn Error>> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!(addr = %listener.local_addr()?, "serving MCP over streamable HTTP at /mcp");

    let config =
        StreamableHttpServerConfig { stateful_mode: true, ..StreamableHttpServerConfig::default() };
    let shutdown_token = config.cancellation_token.clone();

    let session_manager = Arc::new(LocalSessionManager::default());
    let mcp_service = StreamableHttpService::new(move || Ok(mcp.clone()), session_manager, config);

    let router = Router::new().nest_service("/mcp", mcp_service);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown_token.cancel();
        })
        .await?;
    Ok(())
}

fn main() {
    let result = (|| -> Result<(), Box<dyn Error>> {
        let mut args = std::env::args();
        let program = args.next().unwrap_or_else(|| "houdini-mcp".to_owned());

        let options = match parse_options(args) {
            Ok(options) => options,
            Err(()) => {
                print_usage(&program);
                std::process::exit(2);
            }
        };

        if let Err(err) = logging::init_logging() {
            eprintln!("houdini-mcp: logging disabled: {err}");
        }

        let config = resolve_config(&options, Config::from_env()?);
        let houdini = if options.demo {
            info!("using the in-memory demo scene");
            Houdini::new(Arc::new(MemoryHost::demo()), &config)
        } else {
            info!(host = %config.host, port = config.port, "using the Houdini bridge over TCP");
            Houdini::connect_tcp(&config)
        };
        let mcp = HoudiniMcp::new(houdini);

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        match options.http_port {
            Some(port) => runtime.block_on(serve_http(mcp, port))?,
            None => runtime.block_on(mcp.serve_stdio())?,
        }
        Ok(())
    })();

    if let Err(err) = result {
        error!(error = %err, "fatal");
        eprintln!("houdini-mcp: {err}");
        std::process::exit(1);
    }
}
