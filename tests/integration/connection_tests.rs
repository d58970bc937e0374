//! Connection lifecycle against an in-process WebSocket server.

use std::time::Duration;

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

use worker_harness::config::ConnectionConfig;
use worker_harness::connection::{Connection, ConnectionState, Frame};
use worker_harness::harness::LoopEvent;
use worker_harness::AppError;

use super::test_helpers::{
    await_close, close_normally, idle_listener, mock_worker, next_text, refused_endpoint,
    test_config, TIMEOUT,
};

fn connection_config() -> ConnectionConfig {
    test_config().connection
}

#[tokio::test]
async fn connect_opens_and_send_reaches_peer() {
    let (endpoint, server) = mock_worker(|mut ws| async move {
        let text = next_text(&mut ws).await;
        let code = await_close(&mut ws).await;
        (text, code)
    })
    .await;
    let (tx, _rx) = mpsc::unbounded_channel();

    let mut conn = Connection::connect(&endpoint, &connection_config(), tx)
        .await
        .expect("connect");
    assert_eq!(conn.state(), ConnectionState::Open);
    assert_eq!(conn.url(), endpoint.url());

    conn.send("hello worker".to_owned()).await.expect("send");
    conn.close(CloseCode::Normal).await;
    assert_eq!(conn.state(), ConnectionState::Closed);

    let (text, code) = timeout(TIMEOUT, server).await.expect("server done").expect("join");
    assert_eq!(text, "hello worker");
    assert_eq!(code, Some(1000));
}

#[tokio::test]
async fn close_is_idempotent_and_send_after_close_is_rejected() {
    let (endpoint, server) = mock_worker(|mut ws| async move { await_close(&mut ws).await }).await;
    let (tx, _rx) = mpsc::unbounded_channel();

    let mut conn = Connection::connect(&endpoint, &connection_config(), tx)
        .await
        .expect("connect");

    conn.close(CloseCode::Normal).await;
    conn.close(CloseCode::Normal).await;
    conn.abort("already closed");
    assert_eq!(conn.state(), ConnectionState::Closed);

    let err = conn
        .send("late".to_owned())
        .await
        .expect_err("send after close must fail");
    assert!(matches!(err, AppError::Connection(ref msg) if msg.contains("closed")));

    let code = timeout(TIMEOUT, server).await.expect("server done").expect("join");
    assert_eq!(code, Some(1000));
}

#[tokio::test]
async fn inbound_text_and_binary_frames_are_forwarded_in_order() {
    let (endpoint, server) = mock_worker(|mut ws| async move {
        ws.send(Message::text("first".to_owned())).await.expect("send text");
        ws.send(Message::binary(vec![1_u8, 2, 3])).await.expect("send binary");
        ws.send(Message::text("second".to_owned())).await.expect("send text");
        await_close(&mut ws).await
    })
    .await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut conn = Connection::connect(&endpoint, &connection_config(), tx)
        .await
        .expect("connect");

    let mut frames = Vec::new();
    while frames.len() < 3 {
        match timeout(TIMEOUT, rx.recv()).await.expect("frame in time") {
            Some(LoopEvent::Frame(frame)) => frames.push(frame),
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(
        frames,
        vec![
            Frame::Text("first".into()),
            Frame::Binary(vec![1, 2, 3]),
            Frame::Text("second".into()),
        ]
    );

    conn.close(CloseCode::Normal).await;
    timeout(TIMEOUT, server).await.expect("server done").expect("join");
}

#[tokio::test]
async fn peer_close_is_reported_and_acknowledged() {
    let (endpoint, server) = mock_worker(|mut ws| async move {
        close_normally(&mut ws).await;
    })
    .await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut conn = Connection::connect(&endpoint, &connection_config(), tx)
        .await
        .expect("connect");

    match timeout(TIMEOUT, rx.recv()).await.expect("close in time") {
        Some(LoopEvent::PeerClosed { code, reason }) => {
            assert_eq!(code, Some(1000));
            assert_eq!(reason, "bye");
        }
        other => panic!("expected PeerClosed, got {other:?}"),
    }

    conn.close(CloseCode::Normal).await;
    assert_eq!(conn.state(), ConnectionState::Closed);

    // The server's drain only ends once our reply has been flushed.
    timeout(TIMEOUT, server).await.expect("server done").expect("join");
}

#[tokio::test]
async fn refused_connection_is_connect_error() {
    let endpoint = refused_endpoint().await;
    let (tx, _rx) = mpsc::unbounded_channel();

    let err = Connection::connect(&endpoint, &connection_config(), tx)
        .await
        .expect_err("nothing is listening");

    assert!(matches!(err, AppError::Connect(_)));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn stalled_handshake_times_out() {
    let (endpoint, _listener) = idle_listener().await;
    let config = ConnectionConfig {
        connect_timeout_seconds: 1,
        ..connection_config()
    };
    let (tx, _rx) = mpsc::unbounded_channel();

    let err = timeout(Duration::from_secs(5), Connection::connect(&endpoint, &config, tx))
        .await
        .expect("connect must give up on its own")
        .expect_err("handshake never completes");

    assert!(matches!(err, AppError::Connect(ref msg) if msg.contains("timed out")));
}

#[tokio::test]
async fn server_dropping_socket_is_connection_failure() {
    let (endpoint, server) = mock_worker(|ws| async move { drop(ws) }).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut conn = Connection::connect(&endpoint, &connection_config(), tx)
        .await
        .expect("connect");
    timeout(TIMEOUT, server).await.expect("server done").expect("join");

    match timeout(TIMEOUT, rx.recv()).await.expect("event in time") {
        Some(LoopEvent::ConnectionFailed(_)) => {}
        other => panic!("expected ConnectionFailed, got {other:?}"),
    }

    conn.abort("socket dropped");
    assert_eq!(conn.state(), ConnectionState::Closed);
}
