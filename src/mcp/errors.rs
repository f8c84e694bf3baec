//! MCP Error Handling
//!
//! Protocol-level failures and their JSON-RPC error objects. Failures of the
//! RAG operations themselves are reported as tool results instead.

use crate::RagError;
use crate::mcp::protocol::*;
use thiserror::Error;
use tracing::{error, warn};

/// MCP-specific errors that can occur during server operation
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Invalid tool parameters for {tool}: {message}")]
    InvalidToolParameters { tool: String, message: String },

    #[error("Server not initialized")]
    ServerNotInitialized,

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },
}

pub type McpResult<T> = Result<T, McpError>;

impl McpError {
    #[inline]
    pub fn invalid_tool_parameters(tool: &str, message: impl Into<String>) -> Self {
        Self::InvalidToolParameters {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    /// Convert MCP error to JSON-RPC error
    #[inline]
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        match self {
            Self::ToolNotFound { name } => JsonRpcError::new(
                mcp_error_codes::TOOL_NOT_FOUND,
                format!("Tool not found: {}", name),
                None,
            ),
            Self::InvalidToolParameters { tool, message } => JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!("Invalid parameters for tool '{}': {}", tool, message),
                None,
            ),
            Self::ServerNotInitialized => JsonRpcError::new(
                mcp_error_codes::SERVER_NOT_INITIALIZED,
                "Server not initialized. Send initialize request first.".to_string(),
                None,
            ),
            Self::InvalidRequest { message } => {
                JsonRpcError::new(error_codes::INVALID_REQUEST, message.clone(), None)
            }
            Self::InternalError { message } => {
                JsonRpcError::new(error_codes::INTERNAL_ERROR, message.clone(), None)
            }
            Self::MethodNotFound { method } => JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
                None,
            ),
            Self::InvalidParameters { message } => {
                JsonRpcError::new(error_codes::INVALID_PARAMS, message.clone(), None)
            }
        }
    }

    /// Create error response message
    #[inline]
    pub fn to_error_response(&self, id: Option<RequestId>) -> JsonRpcMessage {
        let error = self.to_jsonrpc_error();
        JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(error, id))
    }

    /// Log the error with appropriate level
    #[inline]
    pub fn log(&self) {
        match self {
            Self::InternalError { .. } => error!("Server error: {}", self),
            _ => warn!("Client error: {}", self),
        }
    }
}

impl From<serde_json::Error> for McpError {
    #[inline]
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidParameters {
            message: error.to_string(),
        }
    }
}

/// Tool result for a failed RAG operation, prefixed with the error kind
#[inline]
pub fn tool_failure(error: &RagError) -> CallToolResult {
    if error.is_client_error() {
        warn!("Tool call rejected: {}", error);
    } else {
        error!("Tool call failed: {}", error);
    }
    CallToolResult::error(format!("{}: {}", error.kind(), error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_not_found_error() {
        let error = McpError::ToolNotFound {
            name: "missing".to_string(),
        };
        let rpc = error.to_jsonrpc_error();
        assert_eq!(rpc.code, mcp_error_codes::TOOL_NOT_FOUND);
        assert!(rpc.message.contains("missing"));
    }

    #[test]
    fn invalid_parameters_use_standard_code() {
        let error = McpError::invalid_tool_parameters("ask_question", "query is required");
        let rpc = error.to_jsonrpc_error();
        assert_eq!(rpc.code, error_codes::INVALID_PARAMS);
        assert!(rpc.message.contains("ask_question"));
        assert!(rpc.message.contains("query is required"));
    }

    #[test]
    fn error_response_creation() {
        let error = McpError::MethodNotFound {
            method: "resources/list".to_string(),
        };
        let message = error.to_error_response(Some(RequestId::Number(7)));

        let JsonRpcMessage::ErrorResponse(response) = message else {
            panic!("expected an error response");
        };
        assert_eq!(response.id, Some(RequestId::Number(7)));
        assert_eq!(response.error.code, error_codes::METHOD_NOT_FOUND);
    }

    #[test]
    fn tool_failure_names_the_kind() {
        let result = tool_failure(&RagError::SessionNotFound("abc".to_string()));
        assert_eq!(result.is_error, Some(true));
        assert!(result.text_content().starts_with("session_not_found: "));

        let result = tool_failure(&RagError::EmptyDocument);
        assert!(result.text_content().starts_with("empty_document: "));
    }
}
