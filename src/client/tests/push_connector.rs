mod common;

use common::hub::{close, invocation, log_batch, ping, HubAction, TestHub};
use ghtail_client::push::connect;
use ghtail_client::TailError;
use ghtail_common::constants::CONSOLE_OUTPUT_TARGET;
use ghtail_common::wire::LogBatch;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn delivers_invocations_in_order_and_stops_on_close() {
    let hub = TestHub::launch(vec![(
        CONSOLE_OUTPUT_TARGET,
        vec![
            HubAction::Send(ping()),
            HubAction::Send(invocation(
                CONSOLE_OUTPUT_TARGET,
                json!([log_batch("r", "s", &["one"]), log_batch("r", "s", &["two"])]),
            )),
            HubAction::Send(format!(
                "{}{}",
                ping(),
                invocation(CONSOLE_OUTPUT_TARGET, json!([log_batch("r", "s", &["three"])]))
            )),
            HubAction::Send(close()),
        ],
    )])
    .await;

    let token = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<LogBatch>(8);

    connect(&token, &hub.url(), CONSOLE_OUTPUT_TARGET, &tx)
        .await
        .unwrap();

    let lines: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
        .flat_map(|batch| batch.lines)
        .collect();
    assert_eq!(lines, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn subscribes_with_ids_from_the_url() {
    let hub = TestHub::launch(vec![(CONSOLE_OUTPUT_TARGET, vec![HubAction::Send(close())])]).await;
    let token = CancellationToken::new();
    let (tx, _rx) = mpsc::channel::<LogBatch>(1);

    connect(&token, &hub.url(), CONSOLE_OUTPUT_TARGET, &tx)
        .await
        .unwrap();

    assert_eq!(
        hub.subscriptions(),
        vec![r#"{"arguments":["tenant-1","77"],"target":"WatchRunAsync","type":1}"#.to_string()]
    );
}

#[tokio::test]
async fn ping_alone_is_not_an_event() {
    let hub = TestHub::launch(vec![(
        CONSOLE_OUTPUT_TARGET,
        vec![HubAction::Send(ping()), HubAction::CloseSocket],
    )])
    .await;
    let token = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<LogBatch>(1);

    connect(&token, &hub.url(), CONSOLE_OUTPUT_TARGET, &tx)
        .await
        .unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn dropped_socket_is_a_reset() {
    let hub = TestHub::launch(vec![(
        CONSOLE_OUTPUT_TARGET,
        vec![
            HubAction::Send(invocation(
                CONSOLE_OUTPUT_TARGET,
                json!([log_batch("r", "s", &["before reset"])]),
            )),
            HubAction::Reset,
        ],
    )])
    .await;
    let token = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<LogBatch>(4);

    let err = connect(&token, &hub.url(), CONSOLE_OUTPUT_TARGET, &tx)
        .await
        .unwrap_err();

    assert!(err.is_connection_reset(), "unexpected error: {err}");
    assert_eq!(rx.try_recv().unwrap().lines, vec!["before reset"]);
}

#[tokio::test]
async fn malformed_frame_is_a_protocol_error() {
    let hub = TestHub::launch(vec![(
        CONSOLE_OUTPUT_TARGET,
        vec![HubAction::Send("{\"type\":1,\"arguments\":[\u{1e}".to_string())],
    )])
    .await;
    let token = CancellationToken::new();
    let (tx, _rx) = mpsc::channel::<LogBatch>(1);

    let err = connect(&token, &hub.url(), CONSOLE_OUTPUT_TARGET, &tx)
        .await
        .unwrap_err();
    assert!(matches!(err, TailError::Protocol { .. }));
}

#[tokio::test]
async fn cancellation_closes_the_socket() {
    let hub = TestHub::launch(vec![]).await;
    let token = CancellationToken::new();
    let (tx, _rx) = mpsc::channel::<LogBatch>(1);

    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        })
    };

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        connect(&token, &hub.url(), CONSOLE_OUTPUT_TARGET, &tx),
    )
    .await
    .unwrap()
    .unwrap_err();

    canceller.await.unwrap();
    assert!(err.is_cancelled());
    assert!(err.is_benign());
}

#[tokio::test]
async fn unreachable_hub_is_fatal() {
    let token = CancellationToken::new();
    let (tx, _rx) = mpsc::channel::<LogBatch>(1);

    let err = connect(
        &token,
        "ws://127.0.0.1:1/hub?tenantId=t&runId=1",
        CONSOLE_OUTPUT_TARGET,
        &tx,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, TailError::Connection(_)));
}
