//! # MCPX Duplex: bidirectional request correlation for the Model Context Protocol
//!
//! In MCP either side may issue requests at any time. A server running a tool
//! call can ask the client to elicit input from its user, sample text from a
//! model or list authorized roots, and stream progress and log lines while it
//! works. This crate provides the engine that keeps all of that straight over
//! one ordered channel.
//!
//! ## Features
//!
//! - [`session::Session`]: id allocation, pending request table, dispatch and
//!   cancellation cascades shared by both roles
//! - [`client::Client`] with pluggable callback handlers for elicitation,
//!   sampling, roots, logs and progress
//! - [`server::Server`] with an [`server::InvocationContext`] for tool code and
//!   an in-memory [`server::Registry`] of tools, resources and prompts
//! - In-memory, line-delimited stream and WebSocket transports
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcpx_duplex::protocol::{CallToolResult, Tool};
//! use mcpx_duplex::server::{Registry, ServerBuilder};
//! use mcpx_duplex::transport::MemoryTransport;
//! use mcpx_duplex::ClientBuilder;
//!
//! # async fn run() -> Result<(), mcpx_duplex::Error> {
//! let registry = Registry::new().with_tool(Tool::new("greet", "Say hello"), |ctx, _args| async move {
//!     let name = ctx.sample_text("Pick a name").await?;
//!     Ok(CallToolResult::text(format!("Hello, {}!", name)))
//! });
//! let server = ServerBuilder::new().with_tools(true).build(registry);
//!
//! let (client_end, server_end) = MemoryTransport::pair();
//! let (_connection, _server_events) = server.serve(Arc::new(server_end)).await?;
//! let (client, _events) = ClientBuilder::new()
//!     .with_sampling_handler(|_request| async {
//!         Ok(mcpx_duplex::protocol::CreateMessageResult::text("Ada", "demo-model"))
//!     })
//!     .with_transport(Box::new(client_end))
//!     .connect()
//!     .await?;
//!
//! let result = client.call_tool("greet", None).await?;
//! assert_eq!(result.first_text(), Some("Hello, Ada!"));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;
pub mod utils;

// Re-export commonly used types for convenience
pub use client::Client;
pub use client::ClientBuilder;
pub use server::Server;
pub use server::ServerBuilder;
pub use session::{Outcome, Session, SessionEvent};
pub use protocol::Implementation;
pub use error::{Error, Result};
