// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! MCP request dispatch: `initialize`, `tools/list`, `tools/call`, and the
//! `openDiff`/`closeDiff` tool surface.
//!
//! Mirrors `mcp::server::McpServer`'s `handle_message`/`handle_request`
//! shape, generalized from stdio to an HTTP-carried JSON-RPC request.

use crate::diff;
use crate::rpc::{Request, RequestId, Response, BAD_SESSION, INTERNAL_ERROR, METHOD_NOT_FOUND};
use axum::http::StatusCode;
use serde_json::{json, Value};

use super::error::BridgeError;
use super::AppState;

/// Dispatches a single JSON-RPC request against the given session/editor
/// state, returning the response to send back and the HTTP status it
/// should be carried on.
pub async fn dispatch(state: &AppState, request: Request) -> (Response, StatusCode) {
    match request.method.as_str() {
        "initialize" => (handle_initialize(request.id), StatusCode::OK),
        "tools/list" => (handle_tools_list(request.id), StatusCode::OK),
        "tools/call" => handle_tools_call(state, request).await,
        "ping" => {
            let response = Response::success(request.id, json!({})).unwrap_or_else(|_| {
                Response::error(RequestId::Number(0), INTERNAL_ERROR, "serialization failure")
            });
            (response, StatusCode::OK)
        }
        other => (
            Response::error(request.id, METHOD_NOT_FOUND, format!("method not found: {other}")),
            StatusCode::OK,
        ),
    }
}

fn handle_initialize(id: RequestId) -> Response {
    let result = json!({
        "protocolVersion": "2024-11-05",
        "capabilities": { "tools": {} },
        "serverInfo": { "name": "ide-companion-bridge", "version": env!("BRIDGE_VERSION") },
    });
    Response::success(id, result)
        .unwrap_or_else(|_| Response::error(id, INTERNAL_ERROR, "serialization failure"))
}

fn handle_tools_list(id: RequestId) -> Response {
    let result = json!({
        "tools": [
            {
                "name": "openDiff",
                "description": "Opens an inline diff view in the editor for review.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "filePath": { "type": "string" },
                        "newContent": { "type": "string" },
                    },
                    "required": ["filePath", "newContent"],
                },
            },
            {
                "name": "closeDiff",
                "description": "Closes an open diff view, returning its edited content if any.",
                "inputSchema": {
                    "type": "object",
                    "properties": { "filePath": { "type": "string" } },
                    "required": ["filePath"],
                },
            },
        ],
    });
    Response::success(id, result)
        .unwrap_or_else(|_| Response::error(id, INTERNAL_ERROR, "serialization failure"))
}

async fn handle_tools_call(state: &AppState, request: Request) -> (Response, StatusCode) {
    let id = request.id.clone();
    let Some(params) = request.params else {
        return (Response::error(id, BAD_SESSION, "missing params"), StatusCode::OK);
    };
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return (Response::error(id, BAD_SESSION, "missing tool name"), StatusCode::OK);
    };
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    let result = match name {
        "openDiff" => handle_open_diff(state, &arguments).await,
        "closeDiff" => handle_close_diff(state, &arguments).await,
        other => Err(BridgeError::UnknownTool(other.to_string())),
    };

    match result {
        Ok(value) => match Response::success(id.clone(), value) {
            Ok(response) => (response, StatusCode::OK),
            Err(e) => {
                let err = BridgeError::from(e);
                let status = err.http_status();
                (err.into_rpc_response(id), status)
            }
        },
        Err(err) => {
            let status = err.http_status();
            (err.into_rpc_response(id), status)
        }
    }
}

async fn handle_open_diff(state: &AppState, arguments: &Value) -> Result<Value, BridgeError> {
    let file_path = arguments
        .get("filePath")
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::InvalidParams("openDiff requires filePath".to_string()))?;
    let new_content = arguments.get("newContent").and_then(Value::as_str).unwrap_or("");

    diff::show_diff(&state.editor, file_path, new_content).await?;
    Ok(json!({ "content": [] }))
}

async fn handle_close_diff(state: &AppState, arguments: &Value) -> Result<Value, BridgeError> {
    let file_path = arguments
        .get("filePath")
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::InvalidParams("closeDiff requires filePath".to_string()))?;

    let content = diff::close_diff(&state.editor, file_path).await?;
    let text = json!({ "content": content }).to_string();
    Ok(json!({ "content": [{ "type": "text", "text": text }] }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_response_carries_server_info() {
        let response = handle_initialize(RequestId::Number(1));
        let result = response.result.unwrap_or_default();
        assert_eq!(result["serverInfo"]["name"], "ide-companion-bridge");
    }

    #[test]
    fn tools_list_exposes_open_and_close_diff() {
        let response = handle_tools_list(RequestId::Number(1));
        let result = response.result.unwrap_or_default();
        let names: Vec<&str> = result["tools"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert!(names.contains(&"openDiff"));
        assert!(names.contains(&"closeDiff"));
    }
}
