//! End-to-end tests using a real WebSocket client against an axum server.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use common::{OPEN_ABC, RecordingDispatcher, TIMEOUT};
use sockline_engine::transport::websocket::WebSocketTransport;
use sockline_engine::{
    CloseReason, OverflowRegistry, PingParams, Session, SessionConfig, SessionMeta,
};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<RecordingDispatcher>,
    registry: OverflowRegistry,
}

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let session = Session::new(
            WebSocketTransport::new(socket, PingParams::default()),
            state.dispatcher.clone(),
            state.registry.clone(),
            SessionConfig::default(),
            SessionMeta {
                remote_addr: Some(addr),
                request: None,
            },
        );
        let _ = session.start().join().await;
    })
}

/// Boot a test server and return the WS URL plus the recording dispatcher.
async fn boot_server() -> (String, Arc<RecordingDispatcher>) {
    let dispatcher = RecordingDispatcher::new();
    let state = AppState {
        dispatcher: dispatcher.clone(),
        registry: OverflowRegistry::new(),
    };
    let app = Router::new()
        .route("/socket.io/", get(upgrade))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    (format!("ws://{addr}/socket.io/"), dispatcher)
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = timeout(TIMEOUT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    ws
}

async fn next_text(ws: &mut WsStream) -> String {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("read timed out")
            .expect("stream ended")
            .expect("read failed");
        if let Message::Text(text) = msg {
            return text.as_str().to_owned();
        }
    }
}

#[tokio::test]
async fn e2e_handshake_ping_and_event() {
    let (url, dispatcher) = boot_server().await;
    let mut ws = connect(&url).await;

    ws.send(Message::Text(OPEN_ABC.into())).await.unwrap();
    ws.send(Message::Text("2".into())).await.unwrap();
    assert_eq!(next_text(&mut ws).await, "3");

    ws.send(Message::Text(r#"42["hello","world"]"#.into()))
        .await
        .unwrap();
    dispatcher.wait_until(|d| d.messages().len() == 1).await;

    let message = &dispatcher.messages()[0];
    assert_eq!(message.event.as_deref(), Some("hello"));
    assert_eq!(message.args, serde_json::json!("world"));

    let session = dispatcher.last_session().unwrap();
    assert_eq!(session.id(), Some("abc"));
    assert!(session.remote_addr().is_some_and(|a| a.ip().is_loopback()));
}

#[tokio::test]
async fn e2e_server_emit_reaches_client() {
    let (url, dispatcher) = boot_server().await;
    let mut ws = connect(&url).await;
    ws.send(Message::Text(OPEN_ABC.into())).await.unwrap();
    dispatcher.wait_until(|d| !d.connections().is_empty()).await;

    let session = dispatcher.last_session().unwrap();
    session
        .emit("greeting", serde_json::json!({"n": 1}))
        .unwrap();
    assert_eq!(next_text(&mut ws).await, r#"42["greeting",{"n":1}]"#);
}

#[tokio::test]
async fn e2e_client_disconnect_closes_session_once() {
    let (url, dispatcher) = boot_server().await;
    let mut ws = connect(&url).await;
    ws.send(Message::Text(OPEN_ABC.into())).await.unwrap();
    dispatcher.wait_until(|d| !d.connections().is_empty()).await;

    ws.close(None).await.unwrap();
    dispatcher
        .wait_until(|d| !d.disconnections().is_empty())
        .await;

    let session = dispatcher.last_session().unwrap();
    assert!(!session.is_alive());
    assert_eq!(dispatcher.disconnections().len(), 1);
    assert!(matches!(
        dispatcher.disconnections()[0],
        CloseReason::Transport(_)
    ));
}
