mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

use mcpx_duplex::client::{ClientBuilder, RootsHandler};
use mcpx_duplex::error::{Error, Result};
use mcpx_duplex::protocol::{CreateMessageParams, CreateMessageResult, ElicitRequestParams, ElicitResult, ProgressParams, Root};
use mcpx_duplex::{Client, Outcome};

use common::{connect, tools};

fn registry() -> mcpx_duplex::server::Registry {
    tools(Arc::new(AtomicUsize::new(0)))
}

#[tokio::test]
async fn cancelling_long_execution_stops_progress() {
    let iterations = Arc::new(AtomicUsize::new(0));
    let (client, connection) = connect(tools(iterations.clone()), |b| b).await;

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressParams>();
    let call = client
        .start_tool_call(
            "long_execution",
            Some(json!({"count": 10})),
            Some(Box::new(move |p: &ProgressParams| {
                let _ = progress_tx.send(p.clone());
            })),
        )
        .await
        .unwrap();

    for expected in 1..=3 {
        let progress = progress_rx.recv().await.unwrap();
        assert_eq!(progress.progress, expected as f64);
        assert_eq!(progress.total, Some(10.0));
    }
    let id = call.id().clone();
    assert_ok!(client.cancel(&id, Some("user got bored".to_string())).await);

    assert!(matches!(call.outcome().await, Outcome::Cancelled));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(iterations.load(Ordering::SeqCst) <= 4);
    assert_eq!(connection.session().running_count(), 0);
    assert!(client.session().lookup(&id).is_none());
}

#[tokio::test]
async fn declined_elicitation_is_reflected_in_tool_result() {
    let (client, _connection) = connect(registry(), |b| {
        b.with_elicitation_handler(|request: ElicitRequestParams| async move {
            assert_eq!(request.message, "What is your name?");
            assert!(request.requested_schema.is_some());
            Ok(ElicitResult::decline())
        })
    })
    .await;

    let result = client.call_tool("collect_user_info", None).await.unwrap();
    assert!(!result.is_error);
    assert_eq!(
        result.structured_content,
        Some(json!({"provided": false, "reason": "declined"}))
    );
}

#[tokio::test]
async fn accepted_elicitation_returns_content() {
    let (client, _connection) = connect(registry(), |b| {
        b.with_elicitation_handler(|_request: ElicitRequestParams| async move {
            Ok(ElicitResult::accept(json!({"name": "Ada"})))
        })
    })
    .await;

    let result = client.call_tool("collect_user_info", None).await.unwrap();
    assert_eq!(result.structured_content, Some(json!({"provided": true, "name": "Ada"})));
}

#[tokio::test]
async fn accepted_elicitation_must_match_schema() {
    for answer in [ElicitResult::accept_empty(), ElicitResult::accept(json!({"nickname": "Ada"}))] {
        let (client, _connection) = connect(registry(), move |b| {
            b.with_elicitation_handler(move |_request: ElicitRequestParams| {
                let answer = answer.clone();
                async move { Ok(answer) }
            })
        })
        .await;

        match client.call_tool("collect_user_info", None).await {
            Err(Error::InvalidParams(message)) => assert!(message.contains("elicitation")),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[tokio::test]
async fn elicitation_without_client_handler_is_unsupported() {
    let (client, _connection) = connect(registry(), |b| b).await;

    match client.call_tool("collect_user_info", None).await {
        Err(Error::UnsupportedCapability(message)) => assert!(message.contains("elicitation")),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn out_of_order_responses_reach_their_callers() {
    let (client, _connection) = connect(registry(), |b| b).await;

    let a = client
        .start_tool_call("delayed_echo", Some(json!({"label": "A", "delay_ms": 200})), None)
        .await
        .unwrap();
    let b = client
        .start_tool_call("delayed_echo", Some(json!({"label": "B", "delay_ms": 10})), None)
        .await
        .unwrap();
    assert_ne!(a.id(), b.id());

    let b_result = Client::tool_result(b).await.unwrap();
    // A is still outstanding when B completes
    assert_eq!(client.session().pending_count(), 1);
    let a_result = Client::tool_result(a).await.unwrap();

    assert_eq!(a_result.first_text(), Some("A"));
    assert_eq!(b_result.first_text(), Some("B"));
}

#[tokio::test]
async fn tool_reads_file_under_authorized_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "remember the milk").unwrap();
    let root = Root::from_directory(dir.path()).unwrap().with_name("workspace");

    let (client, _connection) = connect(registry(), |b| b.with_roots(vec![root])).await;

    let result = client
        .call_tool("read_file", Some(json!({"path": "notes.txt"})))
        .await
        .unwrap();
    assert_eq!(result.first_text(), Some("remember the milk"));

    match client.call_tool("read_file", Some(json!({"path": "../escape.txt"}))).await {
        Err(Error::InvalidParams(_)) => {}
        other => panic!("unexpected {other:?}"),
    }
}

mock! {
    Roots {}

    #[async_trait]
    impl RootsHandler for Roots {
        async fn list_roots(&self) -> Result<Vec<Root>>;
    }
}

#[tokio::test]
async fn empty_roots_mean_no_access() {
    let mut roots = MockRoots::new();
    roots.expect_list_roots().times(1).returning(|| Ok(vec![]));

    let (client, _connection) = connect(registry(), move |b| b.with_roots_handler(roots)).await;

    let result = client
        .call_tool("read_file", Some(json!({"path": "notes.txt"})))
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(result.first_text(), Some("no access granted"));
}

#[tokio::test]
async fn tool_samples_through_client() {
    let (client, _connection) = connect(registry(), |b| {
        b.with_sampling_handler(|request: CreateMessageParams| async move {
            let prompt = request.messages[0].content.as_text().unwrap_or_default().to_string();
            assert!(prompt.starts_with("Summarize: "));
            Ok(CreateMessageResult::text("short version", "test-model"))
        })
    })
    .await;

    let result = client
        .call_tool("summarize", Some(json!({"text": "a very long text"})))
        .await
        .unwrap();
    assert_eq!(result.first_text(), Some("short version"));
}

#[tokio::test]
async fn cancelling_tool_cancels_its_pending_elicitation() {
    let (asked_tx, mut asked_rx) = mpsc::unbounded_channel::<()>();
    let (client, connection) = connect(registry(), move |b| {
        b.with_elicitation_handler(move |_request: ElicitRequestParams| {
            let asked_tx = asked_tx.clone();
            async move {
                let _ = asked_tx.send(());
                // The user never answers
                std::future::pending::<()>().await;
                Ok(ElicitResult::cancel())
            }
        })
    })
    .await;

    let call = client.start_tool_call("collect_user_info", None, None).await.unwrap();
    asked_rx.recv().await.unwrap();
    let id = call.id().clone();
    client.cancel(&id, None).await.unwrap();
    assert!(call.outcome().await.is_cancelled());

    // Both the tool execution and its nested elicitation wind down
    tokio::time::timeout(Duration::from_secs(2), async {
        while connection.session().running_count() > 0
            || connection.session().pending_count() > 0
            || client.session().running_count() > 0
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn closing_client_fails_outstanding_calls() {
    let (client, connection) = connect(registry(), |b| b).await;

    let call = client
        .start_tool_call("delayed_echo", Some(json!({"label": "late", "delay_ms": 5000})), None)
        .await
        .unwrap();
    client.close().await;

    match call.outcome().await {
        Outcome::Failed(Error::ChannelClosed(_)) => {}
        other => panic!("unexpected {other:?}"),
    }
    tokio::time::timeout(Duration::from_secs(2), connection.closed())
        .await
        .unwrap();
    assert!(matches!(client.ping().await, Err(Error::ChannelClosed(_))));
}

#[tokio::test]
async fn builder_without_transport_is_rejected() {
    assert!(matches!(ClientBuilder::new().connect().await, Err(Error::ConfigError(_))));
}
