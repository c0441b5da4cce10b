//! A tool that reads a file under a client root and has the client's model
//! summarize it.
//!
//! Run with `cargo run --example sampling_roots -- <directory> <file>`.
//! Without arguments it summarizes its own `Cargo.toml`.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mcpx_duplex::protocol::{CallToolResult, CreateMessageParams, CreateMessageResult, Root, Tool};
use mcpx_duplex::server::{InvocationContext, Registry, ServerBuilder};
use mcpx_duplex::transport::MemoryTransport;
use mcpx_duplex::utils::uri::path_under_root;
use mcpx_duplex::{ClientBuilder, Error};

async fn summarize_file(ctx: InvocationContext, args: Value) -> Result<CallToolResult, Error> {
    let roots = ctx.list_roots().await?;
    let Some(root) = roots.first() else {
        return Ok(CallToolResult::text("No roots were granted; nothing to read."));
    };

    let path = path_under_root(&root.to_path()?, args["path"].as_str().unwrap_or_default())?;
    ctx.info(format!("reading {}", path.display())).await?;
    let text = tokio::fs::read_to_string(&path).await?;

    ctx.checkpoint()?;
    let request = CreateMessageParams::prompt(format!("Summarize this file:\n{}", text), 200)
        .with_system_prompt("You write one-line summaries.")
        .with_temperature(0.2);
    let reply = ctx.sample(request).await?;
    Ok(CallToolResult::json(json!({
        "file": path.display().to_string(),
        "model": reply.model,
        "summary": reply.as_text(),
    })))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let directory = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")));
    let file = args.next().unwrap_or_else(|| "Cargo.toml".to_string());
    let directory = std::fs::canonicalize(directory)?;

    let registry = Registry::new().with_tool(
        Tool::new("summarize_file", "Summarize a file under the first root"),
        |ctx, args| summarize_file(ctx, args),
    );
    let server = ServerBuilder::new()
        .with_implementation("sampling-roots-demo", "0.1.0")
        .with_tools(true)
        .build(registry);

    let (client_end, server_end) = MemoryTransport::pair();
    let (_connection, _server_events) = server.serve(Arc::new(server_end)).await?;
    let (client, _events) = ClientBuilder::new()
        .with_implementation("sampling-roots-client", "0.1.0")
        .with_roots(vec![Root::from_directory(&directory)?.with_name("workspace")])
        .with_sampling_handler(|request: CreateMessageParams| async move {
            let prompt = request
                .messages
                .last()
                .and_then(|m| m.content.as_text())
                .unwrap_or_default();
            info!("Sampling {} characters", prompt.len());
            // A stand-in model: the first non-empty line of the file
            let first_line = prompt.lines().skip(1).find(|l| !l.trim().is_empty()).unwrap_or("(empty)");
            Ok(CreateMessageResult::text(format!("Starts with: {}", first_line.trim()), "echo-model"))
        })
        .with_transport(Box::new(client_end))
        .connect()
        .await?;

    let result = client.call_tool("summarize_file", Some(json!({"path": file}))).await?;
    let fallback = json!(result.first_text());
    println!("{}", result.structured_content.unwrap_or(fallback));

    client.close().await;
    Ok(())
}
