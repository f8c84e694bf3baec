//! MCP Tools Implementation
//!
//! Tool definitions and handlers exposing the session RAG operations:
//! upload, ask, search, end and list.

use crate::mcp::errors::{McpError, McpResult, tool_failure};
use crate::mcp::protocol::*;
use crate::mcp::server::{McpServer, ToolHandler};
use crate::rag::RagService;
use crate::session::SessionId;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

type Arguments = HashMap<String, Value>;

fn required_str<'a>(args: &'a Arguments, tool: &str, key: &str) -> McpResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::invalid_tool_parameters(tool, format!("Missing required parameter: {key}")))
}

fn optional_str<'a>(args: &'a Arguments, tool: &str, key: &str) -> McpResult<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(_) => Err(McpError::invalid_tool_parameters(
            tool,
            format!("Parameter {key} must be a string"),
        )),
    }
}

fn json_result<T: Serialize>(value: &T) -> McpResult<CallToolResult> {
    let text = serde_json::to_string_pretty(value).map_err(|e| McpError::InternalError {
        message: e.to_string(),
    })?;
    Ok(CallToolResult::text(text))
}

fn session_id_schema() -> Value {
    json!({
        "type": "string",
        "description": "Session id returned by upload_document"
    })
}

/// Loads a document from disk into a new session
pub struct UploadDocumentHandler {
    service: Arc<RagService>,
}

impl UploadDocumentHandler {
    pub const NAME: &'static str = "upload_document";

    #[inline]
    pub fn new(service: Arc<RagService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            description: Some(
                "Index a plain text or PDF document into a new question-answering session"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path of the document to upload"
                    },
                    "filename": {
                        "type": "string",
                        "description": "Optional: name used to detect the format (a .pdf name is parsed as PDF)"
                    }
                },
                "required": ["path"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for UploadDocumentHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> McpResult<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let path = required_str(&args, Self::NAME, "path")?;
        let filename = optional_str(&args, Self::NAME, "filename")?;

        debug!("Uploading document: path='{}', filename={:?}", path, filename);

        match self.service.upload_path(Path::new(path), filename).await {
            Ok(receipt) => json_result(&receipt),
            Err(e) => Ok(tool_failure(&e)),
        }
    }
}

/// Answers a question from one session's document
pub struct AskQuestionHandler {
    service: Arc<RagService>,
}

impl AskQuestionHandler {
    pub const NAME: &'static str = "ask_question";

    #[inline]
    pub fn new(service: Arc<RagService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            description: Some(
                "Answer a question using the document uploaded to a session".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "session_id": session_id_schema(),
                    "query": {
                        "type": "string",
                        "description": "Question to answer"
                    }
                },
                "required": ["session_id", "query"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for AskQuestionHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> McpResult<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let session_id = required_str(&args, Self::NAME, "session_id")?;
        let query = required_str(&args, Self::NAME, "query")?;

        debug!("Asking session {}: query='{}'", session_id, query);

        let result = match session_id.parse::<SessionId>() {
            Ok(id) => self.service.answer(&id, query).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(answer) => json_result(&answer),
            Err(e) => Ok(tool_failure(&e)),
        }
    }
}

/// Ranked chunks from one session without calling the chat model
pub struct SearchSessionHandler {
    service: Arc<RagService>,
}

impl SearchSessionHandler {
    pub const NAME: &'static str = "search_session";

    #[inline]
    pub fn new(service: Arc<RagService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            description: Some(
                "Return the document chunks most similar to a query within a session".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "session_id": session_id_schema(),
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results (default: 4; zero or less returns nothing)"
                    }
                },
                "required": ["session_id", "query"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for SearchSessionHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> McpResult<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let session_id = required_str(&args, Self::NAME, "session_id")?;
        let query = required_str(&args, Self::NAME, "query")?;

        let limit = match args.get("limit") {
            None | Some(Value::Null) => self.service.retrieval().top_k,
            Some(value) => {
                let limit = value.as_i64().ok_or_else(|| {
                    McpError::invalid_tool_parameters(Self::NAME, "Parameter limit must be an integer")
                })?;
                usize::try_from(limit).unwrap_or(0)
            }
        };

        debug!(
            "Searching session {}: query='{}', limit={}",
            session_id, query, limit
        );

        let result = match session_id.parse::<SessionId>() {
            Ok(id) => self.service.search(&id, query, limit).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(results) => json_result(&json!({ "results": results })),
            Err(e) => Ok(tool_failure(&e)),
        }
    }
}

/// Deletes a session and its index
pub struct EndSessionHandler {
    service: Arc<RagService>,
}

impl EndSessionHandler {
    pub const NAME: &'static str = "end_session";

    #[inline]
    pub fn new(service: Arc<RagService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            description: Some("End a session and discard its document".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "session_id": session_id_schema()
                },
                "required": ["session_id"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for EndSessionHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> McpResult<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let session_id = required_str(&args, Self::NAME, "session_id")?;

        let result = match session_id.parse::<SessionId>() {
            Ok(id) => self.service.end_session(&id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => json_result(&json!({ "status": "Session cleaned up successfully" })),
            Err(e) => Ok(tool_failure(&e)),
        }
    }
}

/// Lists live sessions
pub struct ListSessionsHandler {
    service: Arc<RagService>,
}

impl ListSessionsHandler {
    pub const NAME: &'static str = "list_sessions";

    #[inline]
    pub fn new(service: Arc<RagService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            description: Some("List active document sessions".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ListSessionsHandler {
    #[inline]
    async fn handle(&self, _params: CallToolParams) -> McpResult<CallToolResult> {
        debug!("Listing sessions");
        let sessions = self.service.list_sessions().await;
        json_result(&json!({ "sessions": sessions }))
    }
}

/// Register every session tool on `server`, all sharing `service`
#[inline]
pub async fn register_tools(server: &McpServer, service: &Arc<RagService>) {
    server
        .register_tool(
            UploadDocumentHandler::tool_definition(),
            UploadDocumentHandler::new(Arc::clone(service)),
        )
        .await;
    server
        .register_tool(
            AskQuestionHandler::tool_definition(),
            AskQuestionHandler::new(Arc::clone(service)),
        )
        .await;
    server
        .register_tool(
            SearchSessionHandler::tool_definition(),
            SearchSessionHandler::new(Arc::clone(service)),
        )
        .await;
    server
        .register_tool(
            EndSessionHandler::tool_definition(),
            EndSessionHandler::new(Arc::clone(service)),
        )
        .await;
    server
        .register_tool(
            ListSessionsHandler::tool_definition(),
            ListSessionsHandler::new(Arc::clone(service)),
        )
        .await;
}
