// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

/// MCP server helper functions:
/// parameter validation, request conversion, and core error mapping.
fn execution_request(params: ExecuteParams) -> Result<ExecutionRequest, ErrorData> {
    let timeout = match params.timeout_seconds {
        None => DEFAULT_TIMEOUT,
        Some(seconds) => parse_timeout(seconds)?,
    };

    let defaults = ExecutionRequest::default();
    Ok(ExecutionRequest {
        allow_dangerous: params.allow_dangerous.unwrap_or(false),
        timeout,
        capture_diff: params.capture_diff.unwrap_or(false),
        max_stdout_bytes: params.max_stdout_bytes.unwrap_or(defaults.max_stdout_bytes),
        max_stderr_bytes: params.max_stderr_bytes.unwrap_or(defaults.max_stderr_bytes),
        max_diff_nodes: params.max_diff_nodes.unwrap_or(DEFAULT_MAX_DIFF_NODES),
        code: params.code,
    })
}

fn parse_timeout(seconds: f64) -> Result<Duration, ErrorData> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ErrorData::invalid_params(
            "timeout_seconds must be a positive number",
            Some(serde_json::json!({ "timeout_seconds": seconds })),
        ));
    }
    Duration::try_from_secs_f64(seconds).map_err(|err| {
        ErrorData::invalid_params(
            format!("timeout_seconds out of range: {err}"),
            Some(serde_json::json!({ "timeout_seconds": seconds })),
        )
    })
}

fn parse_root(root: Option<String>) -> Result<Option<String>, ErrorData> {
    root.map(parse_node_path).transpose()
}

fn parse_node_path(path: String) -> Result<String, ErrorData> {
    let trimmed = path.trim();
    if !trimmed.starts_with('/') {
        return Err(ErrorData::invalid_params(
            "node paths must be absolute",
            Some(serde_json::json!({ "path": path })),
        ));
    }
    if trimmed.len() > 1 {
        return Ok(trimmed.trim_end_matches('/').to_owned());
    }
    Ok(trimmed.to_owned())
}

fn catalogue_query(params: NodeTypesParams) -> CatalogueQuery {
    let non_blank = |value: Option<String>| {
        value.map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
    };
    CatalogueQuery {
        category: non_blank(params.category),
        name_contains: non_blank(params.name_filter),
        limit: params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        offset: params.offset.unwrap_or(0),
    }
}

fn map_houdini_error(err: HoudiniError) -> ErrorData {
    match &err {
        HoudiniError::ConnectionLost { operation, .. } => ErrorData::internal_error(
            err.to_string(),
            Some(serde_json::json!({
                "error_type": "connection_error",
                "operation": operation,
                "recoverable": true,
            })),
        ),
        HoudiniError::NodeNotFound(path) => ErrorData::resource_not_found(
            err.to_string(),
            Some(serde_json::json!({ "path": path })),
        ),
        HoudiniError::Host { operation, .. } => ErrorData::internal_error(
            err.to_string(),
            Some(serde_json::json!({
                "error_type": "host_error",
                "operation": operation,
                "recoverable": false,
            })),
        ),
    }
}
