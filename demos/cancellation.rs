//! Cancelling a long-running tool after a few progress reports.
//!
//! Run with `cargo run --example cancellation`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mcpx_duplex::protocol::{CallToolResult, LoggingMessageParams, ProgressParams, RequestId, Tool};
use mcpx_duplex::server::{InvocationContext, Registry, ServerBuilder};
use mcpx_duplex::transport::MemoryTransport;
use mcpx_duplex::{ClientBuilder, Error, Outcome};

async fn long_execution(ctx: InvocationContext, args: Value) -> Result<CallToolResult, Error> {
    let count = args["count"].as_u64().unwrap_or(10);
    for step in 1..=count {
        ctx.checkpoint()?;
        ctx.info(format!("working on step {}", step)).await?;
        ctx.report_progress(step as f64, Some(count as f64), None).await?;
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    Ok(CallToolResult::text(format!("finished {} steps", count)))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let registry = Registry::new().with_tool(
        Tool::new("long_execution", "Work through `count` slow steps"),
        |ctx, args| long_execution(ctx, args),
    );
    let server = ServerBuilder::new()
        .with_implementation("cancellation-demo", "0.1.0")
        .with_tools(true)
        .build(registry);

    let (client_end, server_end) = MemoryTransport::pair();
    let (connection, _server_events) = server.serve(Arc::new(server_end)).await?;
    let (client, _events) = ClientBuilder::new()
        .with_implementation("cancellation-client", "0.1.0")
        .with_log_handler(|_scope: Option<&RequestId>, params: &LoggingMessageParams| {
            info!("server log: {}", params.text().unwrap_or_default());
        })
        .with_transport(Box::new(client_end))
        .connect()
        .await?;

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let call = client
        .start_tool_call(
            "long_execution",
            Some(json!({"count": 10})),
            Some(Box::new(move |p: &ProgressParams| {
                let _ = progress_tx.send(p.progress);
            })),
        )
        .await?;

    let mut seen = 0;
    while let Some(progress) = progress_rx.recv().await {
        println!("progress {}/10", progress);
        seen += 1;
        if seen == 3 {
            break;
        }
    }

    let id = call.id().clone();
    info!("Cancelling {}", id);
    client.cancel(&id, Some("user requested".to_string())).await?;

    match call.outcome().await {
        Outcome::Cancelled => println!("call {} was cancelled", id),
        other => warn!("unexpected outcome {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("executions still running on the server: {}", connection.session().running_count());

    client.close().await;
    Ok(())
}
