//! MCP Protocol Implementation Tests
//!
//! Tool definitions plus full JSON-RPC round trips over an in-memory stream.

#[cfg(test)]
mod tool_definition_tests {
    use crate::mcp::tools::{
        AskQuestionHandler, EndSessionHandler, ListSessionsHandler, SearchSessionHandler,
        UploadDocumentHandler,
    };

    #[test]
    fn upload_document_tool_definition() {
        let tool = UploadDocumentHandler::tool_definition();
        assert_eq!(tool.name, "upload_document");

        let schema = tool.input_schema;
        let properties = schema["properties"].as_object().expect("has properties");
        assert!(properties.contains_key("path"));
        assert!(properties.contains_key("filename"));

        let required = schema["required"].as_array().expect("has required array");
        assert_eq!(required.len(), 1);
        assert_eq!(required[0], "path");
    }

    #[test]
    fn ask_question_tool_definition() {
        let tool = AskQuestionHandler::tool_definition();
        assert_eq!(tool.name, "ask_question");

        let schema = tool.input_schema;
        assert_eq!(schema["properties"]["session_id"]["type"], "string");
        assert_eq!(schema["properties"]["query"]["type"], "string");
        let required = schema["required"].as_array().expect("has required array");
        assert_eq!(required.len(), 2);
    }

    #[test]
    fn search_session_limit_is_an_integer() {
        let tool = SearchSessionHandler::tool_definition();
        let limit_prop = &tool.input_schema["properties"]["limit"];
        assert_eq!(limit_prop["type"], "integer");
    }

    #[test]
    fn session_tools_without_extra_parameters() {
        let end = EndSessionHandler::tool_definition();
        assert_eq!(end.name, "end_session");
        assert_eq!(end.input_schema["required"][0], "session_id");

        let list = ListSessionsHandler::tool_definition();
        assert_eq!(list.name, "list_sessions");
        let properties = list.input_schema["properties"]
            .as_object()
            .expect("has properties");
        assert!(properties.is_empty());
    }
}

#[cfg(test)]
mod wire_message_tests {
    use crate::mcp::protocol::{JSONRPC_VERSION, JsonRpcMessage, RequestId};

    #[test]
    fn request_and_notification_come_from_the_wire() {
        let message: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"a1","method":"tools/list"}"#)
                .expect("request should parse");
        let JsonRpcMessage::Request(request) = message else {
            panic!("expected a request");
        };
        assert_eq!(request.method, "tools/list");
        assert!(request.params.is_none());
        assert!(matches!(request.id, RequestId::String(ref id) if id == "a1"));

        let message: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .expect("notification should parse");
        assert_eq!(message.jsonrpc(), JSONRPC_VERSION);
        assert!(matches!(
            message,
            JsonRpcMessage::Notification(ref notification)
                if notification.method == "notifications/initialized"
        ));
    }
}

#[cfg(test)]
mod server_round_trip_tests {
    use std::io::Write as _;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::io::{
        AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
    };
    use tokio::task::JoinHandle;

    use crate::documents::ChunkingConfig;
    use crate::mcp::protocol::{MCP_VERSION, error_codes, mcp_error_codes};
    use crate::mcp::server::{ConnectionState, McpServer};
    use crate::mcp::tools::register_tools;
    use crate::rag::RagService;
    use crate::session::SessionStore;
    use crate::testing::{BagOfWordsEmbedder, RecordingChatModel};

    struct TestClient {
        writer: WriteHalf<DuplexStream>,
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        server: Arc<McpServer>,
        task: JoinHandle<anyhow::Result<()>>,
    }

    impl TestClient {
        async fn start() -> Self {
            let service = Arc::new(
                RagService::new(
                    Arc::new(SessionStore::unbounded()),
                    Arc::new(BagOfWordsEmbedder::default()),
                    Arc::new(RecordingChatModel::replying("Paris.")),
                )
                .with_chunking(ChunkingConfig::new(40, 0).expect("valid chunking")),
            );
            let server = Arc::new(McpServer::new(
                "session-rag".to_string(),
                "test".to_string(),
            ));
            register_tools(&server, &service).await;

            let (client_side, server_side) = tokio::io::duplex(64 * 1024);
            let (server_read, server_write) = tokio::io::split(server_side);
            let task = tokio::spawn(
                Arc::clone(&server).serve(BufReader::new(server_read), server_write),
            );

            let (client_read, writer) = tokio::io::split(client_side);
            Self {
                writer,
                lines: BufReader::new(client_read).lines(),
                server,
                task,
            }
        }

        async fn send_raw(&mut self, line: &str) {
            self.writer
                .write_all(format!("{line}\n").as_bytes())
                .await
                .expect("write should succeed");
        }

        async fn read(&mut self) -> Value {
            let line = self
                .lines
                .next_line()
                .await
                .expect("read should succeed")
                .expect("server should answer");
            serde_json::from_str(&line).expect("server should send JSON")
        }

        async fn request(&mut self, id: i64, method: &str, params: Value) -> Value {
            let message = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
            self.send_raw(&message.to_string()).await;
            let response = self.read().await;
            assert_eq!(response["id"], id);
            response
        }

        async fn notify(&mut self, method: &str) {
            let message = json!({"jsonrpc": "2.0", "method": method});
            self.send_raw(&message.to_string()).await;
        }

        async fn initialize(&mut self) {
            let response = self
                .request(
                    0,
                    "initialize",
                    json!({
                        "protocolVersion": MCP_VERSION,
                        "capabilities": {},
                        "clientInfo": {"name": "test-client", "version": "1.0"}
                    }),
                )
                .await;
            assert!(response.get("result").is_some());
            self.notify("notifications/initialized").await;
        }

        /// Call a tool, returning the parsed text payload and the error flag
        async fn call_tool(&mut self, id: i64, name: &str, arguments: Value) -> (String, bool) {
            let response = self
                .request(id, "tools/call", json!({"name": name, "arguments": arguments}))
                .await;
            let result = &response["result"];
            let text = result["content"][0]["text"]
                .as_str()
                .expect("tool result should carry text")
                .to_string();
            let is_error = result["isError"].as_bool().expect("isError should be set");
            (text, is_error)
        }

        /// Half-close the client side so the server reads EOF and stops
        async fn close(mut self) -> Arc<McpServer> {
            self.writer
                .shutdown()
                .await
                .expect("shutdown should succeed");
            tokio::time::timeout(Duration::from_secs(5), self.task)
                .await
                .expect("server should stop after EOF")
                .expect("server task should join")
                .expect("server should stop cleanly");
            self.server
        }
    }

    fn facts_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .expect("should create temp file");
        for fact in [
            "paris is the capital of france",
            "berlin is the capital of germany",
            "the seine river flows through paris",
        ] {
            write!(file, "{fact:<40}").expect("should write temp file");
        }
        file
    }

    #[tokio::test]
    async fn initialize_negotiates_version() {
        let mut client = TestClient::start().await;

        let response = client
            .request(
                1,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "old-client", "version": "0.1"}
                }),
            )
            .await;
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(response["result"]["serverInfo"]["name"], "session-rag");
        assert!(response["result"]["capabilities"]["tools"].is_object());

        let response = client
            .request(
                2,
                "initialize",
                json!({
                    "protocolVersion": "1999-01-01",
                    "clientInfo": {"name": "future-client", "version": "9"}
                }),
            )
            .await;
        assert_eq!(response["result"]["protocolVersion"], MCP_VERSION);

        client.close().await;
    }

    #[tokio::test]
    async fn server_stops_when_client_closes_input() {
        let mut client = TestClient::start().await;
        let response = client.request(1, "ping", json!({})).await;
        assert_eq!(response["result"], json!({}));

        let server = client.close().await;
        assert_eq!(server.connection_state().await, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn tools_require_initialization() {
        let mut client = TestClient::start().await;

        let response = client.request(1, "tools/list", json!({})).await;
        assert_eq!(
            response["error"]["code"],
            mcp_error_codes::SERVER_NOT_INITIALIZED
        );

        client.initialize().await;
        let response = client.request(2, "tools/list", json!({})).await;
        let names: Vec<&str> = response["result"]["tools"]
            .as_array()
            .expect("tools array")
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert_eq!(
            names,
            [
                "ask_question",
                "end_session",
                "list_sessions",
                "search_session",
                "upload_document"
            ]
        );

        let server = client.close().await;
        assert_eq!(server.connection_state().await, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn document_session_lifecycle() {
        let mut client = TestClient::start().await;
        client.initialize().await;
        let file = facts_file();

        let (text, is_error) = client
            .call_tool(
                1,
                "upload_document",
                json!({"path": file.path().to_string_lossy()}),
            )
            .await;
        assert!(!is_error, "upload failed: {text}");
        let receipt: Value = serde_json::from_str(&text).expect("receipt JSON");
        assert_eq!(receipt["chunk_count"], 3);
        assert_eq!(receipt["status"], "File processed successfully");
        let session_id = receipt["session_id"]
            .as_str()
            .expect("session id string")
            .to_string();

        let (text, is_error) = client
            .call_tool(
                2,
                "ask_question",
                json!({"session_id": session_id, "query": "what is the capital of france"}),
            )
            .await;
        assert!(!is_error, "ask failed: {text}");
        let answer: Value = serde_json::from_str(&text).expect("answer JSON");
        assert_eq!(answer["answer"], "Paris.");
        let context = answer["context"].as_array().expect("context array");
        assert_eq!(context.len(), 3);
        assert_eq!(
            context[0].as_str().map(str::trim_end),
            Some("paris is the capital of france")
        );

        let (text, _) = client
            .call_tool(
                3,
                "search_session",
                json!({"session_id": session_id, "query": "capital", "limit": -1}),
            )
            .await;
        let results: Value = serde_json::from_str(&text).expect("results JSON");
        assert_eq!(results["results"], json!([]));

        let (text, _) = client
            .call_tool(
                4,
                "search_session",
                json!({"session_id": session_id, "query": "which river flows through paris", "limit": 1}),
            )
            .await;
        let results: Value = serde_json::from_str(&text).expect("results JSON");
        assert_eq!(results["results"][0]["position"], 2);

        let (text, _) = client.call_tool(5, "list_sessions", json!({})).await;
        let listing: Value = serde_json::from_str(&text).expect("listing JSON");
        assert_eq!(listing["sessions"][0]["session_id"], session_id.as_str());
        assert_eq!(listing["sessions"][0]["chunk_count"], 3);

        let (text, is_error) = client
            .call_tool(6, "end_session", json!({"session_id": session_id}))
            .await;
        assert!(!is_error);
        assert!(text.contains("Session cleaned up successfully"));

        let (text, is_error) = client
            .call_tool(
                7,
                "ask_question",
                json!({"session_id": session_id, "query": "anything"}),
            )
            .await;
        assert!(is_error);
        assert!(text.starts_with("session_not_found"));

        client.close().await;
    }

    #[tokio::test]
    async fn domain_failures_are_tool_errors() {
        let mut client = TestClient::start().await;
        client.initialize().await;

        let (text, is_error) = client
            .call_tool(
                1,
                "ask_question",
                json!({"session_id": "not-a-uuid", "query": "hello"}),
            )
            .await;
        assert!(is_error);
        assert!(text.starts_with("session_not_found"));

        let (text, is_error) = client
            .call_tool(2, "upload_document", json!({"path": "/no/such/file.txt"}))
            .await;
        assert!(is_error);
        assert!(text.starts_with("load_error"));

        let empty = tempfile::NamedTempFile::new().expect("should create temp file");
        let (text, is_error) = client
            .call_tool(
                3,
                "upload_document",
                json!({"path": empty.path().to_string_lossy(), "filename": "empty.txt"}),
            )
            .await;
        assert!(is_error);
        assert!(text.starts_with("empty_document"));

        client.close().await;
    }

    #[tokio::test]
    async fn protocol_errors() {
        let mut client = TestClient::start().await;
        client.initialize().await;

        client.send_raw("{not json").await;
        let response = client.read().await;
        assert_eq!(response["error"]["code"], error_codes::PARSE_ERROR);
        assert!(response["id"].is_null());

        client
            .send_raw(r#"{"jsonrpc":"1.0","id":9,"method":"ping"}"#)
            .await;
        let response = client.read().await;
        assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);

        let response = client.request(10, "resources/list", json!({})).await;
        assert_eq!(response["error"]["code"], error_codes::METHOD_NOT_FOUND);

        let response = client
            .request(11, "tools/call", json!({"name": "search_docs", "arguments": {}}))
            .await;
        assert_eq!(response["error"]["code"], mcp_error_codes::TOOL_NOT_FOUND);

        let response = client
            .request(
                12,
                "tools/call",
                json!({"name": "ask_question", "arguments": {"session_id": "abc"}}),
            )
            .await;
        assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);

        let response = client.request(13, "ping", json!({})).await;
        assert_eq!(response["result"], json!({}));

        client.close().await;
    }
}
