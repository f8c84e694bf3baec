//! MCP (Model Context Protocol) Server Implementation
//!
//! This module provides a tools-only MCP server over line-delimited JSON-RPC 2.0,
//! exposing document sessions to MCP clients.

#[cfg(test)]
mod tests;

pub mod errors;
pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;
pub use tools::register_tools;
