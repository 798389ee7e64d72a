// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Population of the node type catalogue.

use serde::Deserialize;
use tracing::{debug, info};

use crate::host::{ExecError, HostConnection, ScriptOutput, TransportError};
use crate::model::NodeTypeEntry;

/// Host-side script printing the whole catalogue as one JSON document.
pub const CATALOGUE_SCRIPT: &str = r#"import json
result = {"types": [], "categories": []}
for cat_name, cat in hou.nodeTypeCategories().items():
    result["categories"].append(cat_name)
    for type_name, type_obj in cat.nodeTypes().items():
        try:
            desc = type_obj.description()
        except Exception:
            desc = ""
        result["types"].append({"category": cat_name, "name": type_name, "description": desc})
print(json.dumps(result))
"#;

#[derive(Debug, Deserialize)]
struct CatalogueDump {
    #[serde(default)]
    types: Vec<NodeTypeEntry>,
}

/// Full catalogue: one scripted dump, else one listing per category.
pub fn populate_node_types(
    conn: &dyn HostConnection,
) -> Result<Vec<NodeTypeEntry>, TransportError> {
    match scripted_catalogue(conn) {
        Ok(types) if !types.is_empty() => {
            info!(types = types.len(), "node types collected by script");
            return Ok(types);
        }
        Ok(_) => debug!("scripted catalogue was empty; listing per category"),
        Err(ExecError::Transport(err)) if err.is_connection_fault() => return Err(err),
        Err(err) => debug!(error = %err, "scripted catalogue unavailable; listing per category"),
    }
    per_category_catalogue(conn)
}

fn scripted_catalogue(conn: &dyn HostConnection) -> Result<Vec<NodeTypeEntry>, ExecError> {
    let output = ScriptOutput::new();
    conn.exec_query(CATALOGUE_SCRIPT, &output)?;
    let stdout = output.stdout();
    match serde_json::from_str::<CatalogueDump>(stdout.trim()) {
        Ok(dump) => Ok(dump.types),
        Err(err) => {
            debug!(error = %err, "catalogue dump is not valid JSON");
            Ok(Vec::new())
        }
    }
}

fn per_category_catalogue(
    conn: &dyn HostConnection,
) -> Result<Vec<NodeTypeEntry>, TransportError> {
    let mut out = Vec::new();
    for category in conn.node_type_categories()? {
        out.extend(conn.node_types(&category)?);
    }
    info!(types = out.len(), "node types collected per category");
    Ok(out)
}
