#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use mcpx_duplex::error::{Error, Result};
use mcpx_duplex::protocol::{CallToolResult, ElicitAction, Tool};
use mcpx_duplex::server::{InvocationContext, Registry, ServerBuilder, ServerSession};
use mcpx_duplex::transport::MemoryTransport;
use mcpx_duplex::utils::uri::path_under_root;
use mcpx_duplex::{Client, ClientBuilder};

/// Tools shared by the scenarios
pub fn tools(iterations: Arc<AtomicUsize>) -> Registry {
    Registry::new()
        .with_tool(Tool::new("long_execution", "Count slowly, reporting progress"), move |ctx, args| {
            let iterations = iterations.clone();
            async move { long_execution(ctx, args, iterations).await }
        })
        .with_tool(Tool::new("collect_user_info", "Ask the user for their name"), |ctx, _args| async move {
            collect_user_info(ctx).await
        })
        .with_tool(Tool::new("delayed_echo", "Echo a label after a delay"), |_ctx, args| async move {
            let delay = args["delay_ms"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(CallToolResult::text(args["label"].as_str().unwrap_or_default()))
        })
        .with_tool(Tool::new("read_file", "Read a file under the first root"), |ctx, args| async move {
            read_file(ctx, args).await
        })
        .with_tool(Tool::new("summarize", "Summarize text with the client's model"), |ctx, args| async move {
            let text = args["text"].as_str().unwrap_or_default().to_string();
            let summary = ctx.sample_text(format!("Summarize: {}", text)).await?;
            Ok(CallToolResult::text(summary))
        })
}

async fn long_execution(ctx: InvocationContext, args: Value, iterations: Arc<AtomicUsize>) -> Result<CallToolResult> {
    let count = args["count"].as_u64().unwrap_or(10);
    for i in 0..count {
        ctx.checkpoint()?;
        iterations.fetch_add(1, Ordering::SeqCst);
        ctx.report_progress((i + 1) as f64, Some(count as f64), Some(format!("step {}", i + 1)))
            .await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    Ok(CallToolResult::text(format!("counted to {}", count)))
}

async fn collect_user_info(ctx: InvocationContext) -> Result<CallToolResult> {
    let schema = json!({
        "type": "object",
        "properties": {"name": {"type": "string"}},
        "required": ["name"]
    });
    let answer = ctx.elicit("What is your name?", Some(schema)).await?;
    let result = match answer.action {
        ElicitAction::Accept => {
            let name = answer
                .content
                .as_ref()
                .and_then(|c| c["name"].as_str())
                .ok_or_else(|| Error::InvalidParams("accepted without a name".to_string()))?;
            json!({"provided": true, "name": name})
        }
        ElicitAction::Decline => json!({"provided": false, "reason": "declined"}),
        ElicitAction::Cancel => json!({"provided": false, "reason": "cancelled"}),
    };
    Ok(CallToolResult::json(result))
}

async fn read_file(ctx: InvocationContext, args: Value) -> Result<CallToolResult> {
    let roots = ctx.list_roots().await?;
    let Some(root) = roots.first() else {
        return Ok(CallToolResult {
            is_error: true,
            ..CallToolResult::text("no access granted")
        });
    };
    let path = path_under_root(&root.to_path()?, args["path"].as_str().unwrap_or_default())?;
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| Error::ExecutionError(format!("{}: {}", path.display(), e)))?;
    Ok(CallToolResult::text(text))
}

/// Serve `registry` and connect a client configured by `configure`
pub async fn connect(
    registry: Registry,
    configure: impl FnOnce(ClientBuilder) -> ClientBuilder,
) -> (Client, ServerSession) {
    let server = ServerBuilder::new()
        .with_implementation("scenario-server", "0.1.0")
        .with_tools(true)
        .with_resources(true)
        .with_prompts(true)
        .build(registry);

    let (client_end, server_end) = MemoryTransport::pair();
    let (connection, _server_events) = server.serve(Arc::new(server_end)).await.unwrap();
    let (client, _events) = configure(ClientBuilder::new().with_implementation("scenario-client", "0.1.0"))
        .with_transport(Box::new(client_end))
        .connect()
        .await
        .unwrap();
    (client, connection)
}
