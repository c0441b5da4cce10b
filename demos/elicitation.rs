//! A tool that asks the user for information mid-call.
//!
//! Run with `cargo run --example elicitation`. Set `RUST_LOG=mcpx_duplex=debug`
//! to watch the nested request travel back to the client.

use std::sync::Arc;

use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mcpx_duplex::protocol::{CallToolResult, ElicitAction, ElicitRequestParams, ElicitResult, Tool};
use mcpx_duplex::server::{InvocationContext, Registry, ServerBuilder};
use mcpx_duplex::transport::MemoryTransport;
use mcpx_duplex::{ClientBuilder, Error};

async fn collect_user_info(ctx: InvocationContext) -> Result<CallToolResult, Error> {
    let schema = json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "age": {"type": "integer", "minimum": 0}
        },
        "required": ["name"]
    });

    let answer = ctx.elicit("Please tell us about yourself", Some(schema)).await?;
    let summary = match answer.action {
        ElicitAction::Accept => json!({"provided": true, "info": answer.content}),
        ElicitAction::Decline => json!({"provided": false, "reason": "the user declined"}),
        ElicitAction::Cancel => json!({"provided": false, "reason": "the user dismissed the form"}),
    };
    Ok(CallToolResult::json(summary))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let registry = Registry::new().with_tool(
        Tool::new("collect_user_info", "Ask the user for their name and age"),
        |ctx, _args| collect_user_info(ctx),
    );
    let server = ServerBuilder::new()
        .with_implementation("elicitation-demo", "0.1.0")
        .with_tools(true)
        .build(registry);

    for decline in [false, true] {
        let (client_end, server_end) = MemoryTransport::pair();
        let (_connection, _server_events) = server.serve(Arc::new(server_end)).await?;

        let (client, _events) = ClientBuilder::new()
            .with_implementation("elicitation-client", "0.1.0")
            .with_elicitation_handler(move |request: ElicitRequestParams| async move {
                info!("Server asks: {}", request.message);
                if decline {
                    Ok(ElicitResult::decline())
                } else {
                    Ok(ElicitResult::accept(json!({"name": "Ada", "age": 36})))
                }
            })
            .with_transport(Box::new(client_end))
            .connect()
            .await?;

        let result = client.call_tool("collect_user_info", None).await?;
        println!(
            "{} -> {}",
            if decline { "decline" } else { "accept" },
            result.structured_content.unwrap_or_default()
        );
        client.close().await;
    }

    Ok(())
}
