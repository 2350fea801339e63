// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Typed failures at the HTTP/JSON-RPC boundary, mapped to both a JSON-RPC
//! error code and an HTTP status per the transport's status contract.

use crate::rpc::{RequestId, Response, BAD_SESSION, INTERNAL_ERROR, METHOD_NOT_FOUND};
use axum::http::StatusCode;
use thiserror::Error;

/// A failure raised while dispatching a `tools/call` request.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// `tools/call` named a tool this server doesn't expose.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// `params`/`arguments` was missing a field the tool requires.
    #[error("{0}")]
    InvalidParams(String),
    /// The call into the attached editor failed.
    #[error("editor call failed: {0}")]
    Editor(#[from] anyhow::Error),
    /// The result payload could not be serialized.
    #[error("failed to serialize response")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// The JSON-RPC error code this failure reports.
    #[must_use]
    pub const fn rpc_code(&self) -> i64 {
        match self {
            Self::UnknownTool(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => BAD_SESSION,
            Self::Editor(_) | Self::Serialization(_) => INTERNAL_ERROR,
        }
    }

    /// The HTTP status this failure maps to. Only genuinely internal
    /// failures (editor call, serialization) produce a 500; a well-formed
    /// request that simply named an unknown tool or bad params still gets a
    /// 200 carrying a JSON-RPC error body, per spec.
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Editor(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnknownTool(_) | Self::InvalidParams(_) => StatusCode::OK,
        }
    }

    /// Builds the JSON-RPC error response body for request `id`.
    #[must_use]
    pub fn into_rpc_response(self, id: RequestId) -> Response {
        let code = self.rpc_code();
        Response::error(id, code, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_failure_maps_to_internal_server_error() {
        let err = BridgeError::Editor(anyhow::anyhow!("boom"));
        assert_eq!(err.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.rpc_code(), INTERNAL_ERROR);
    }

    #[test]
    fn unknown_tool_stays_at_200() {
        let err = BridgeError::UnknownTool("frobnicate".to_string());
        assert_eq!(err.http_status(), StatusCode::OK);
        assert_eq!(err.rpc_code(), METHOD_NOT_FOUND);
    }

    #[test]
    fn invalid_params_stays_at_200_with_bad_session_code() {
        let err = BridgeError::InvalidParams("openDiff requires filePath".to_string());
        assert_eq!(err.http_status(), StatusCode::OK);
        assert_eq!(err.rpc_code(), BAD_SESSION);
    }
}
