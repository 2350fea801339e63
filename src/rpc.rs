// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! JSON-RPC 2.0 envelope types shared by the editor RPC channel (`editor`)
//! and the HTTP/MCP front-end (`server::mcp`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The JSON-RPC version, always `"2.0"`.
    pub jsonrpc: String,
    /// The request ID, echoed back in the response.
    pub id: RequestId,
    /// The method name.
    pub method: String,
    /// The request parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A JSON-RPC notification (no `id`, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// The JSON-RPC version, always `"2.0"`.
    pub jsonrpc: String,
    /// The method name.
    pub method: String,
    /// The notification parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    /// Builds a notification with the given method and serializable params.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` cannot be serialized to JSON.
    pub fn new(method: impl Into<String>, params: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params: Some(serde_json::to_value(params)?),
        })
    }
}

/// A JSON-RPC request ID: either a number or a string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    /// A numeric ID.
    Number(i64),
    /// A string ID.
    String(String),
}

/// A JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The JSON-RPC version, always `"2.0"`.
    pub jsonrpc: String,
    /// The ID of the request this responds to.
    pub id: RequestId,
    /// The result, if the request succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error, if the request failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    /// Creates a successful response.
    ///
    /// # Errors
    ///
    /// Returns an error if `result` cannot be serialized to JSON.
    pub fn success(id: RequestId, result: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(serde_json::to_value(result)?),
            error: None,
        })
    }

    /// Creates an error response.
    pub fn error(id: RequestId, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(ResponseError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    /// The error code.
    pub code: i64,
    /// A short human-readable message.
    pub message: String,
    /// Additional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// The JSON-RPC method was not recognized.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// The server encountered an unexpected internal error.
pub const INTERNAL_ERROR: i64 = -32603;
/// No session ID was provided for a request that requires one.
pub const BAD_SESSION: i64 = -32000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_with_no_params_omits_field() {
        let req = Request {
            jsonrpc: "2.0".to_string(),
            id: RequestId::Number(1),
            method: "ping".to_string(),
            params: None,
        };
        let json = serde_json::to_string(&req).unwrap_or_default();
        assert!(!json.contains("params"));
    }

    #[test]
    fn response_error_omits_result() {
        let resp = Response::error(RequestId::Number(1), METHOD_NOT_FOUND, "nope");
        let json = serde_json::to_string(&resp).unwrap_or_default();
        assert!(!json.contains("\"result\""));
        assert!(json.contains("-32601"));
    }

    #[test]
    fn request_id_untagged_roundtrip() {
        let by_num: RequestId = serde_json::from_str("42").unwrap_or(RequestId::Number(0));
        assert_eq!(by_num, RequestId::Number(42));
        let by_str: RequestId = serde_json::from_str("\"abc\"").unwrap_or(RequestId::Number(0));
        assert_eq!(by_str, RequestId::String("abc".to_string()));
    }
}
