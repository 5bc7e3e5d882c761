use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::{self, protocol::Message};
use tokio_tungstenite::connect_async;

use ecomatrix_locator::config::ConfigSet;
use ecomatrix_locator::handlers::AppState;
use ecomatrix_locator::session::{CallSession, CallSessionStore};
use ecomatrix_locator::telephony::{decode_payload, AgentReply, CallAgent};

/// 受け取ったチャンクの先頭4バイトを返すエージェント
struct EchoAgent;

#[async_trait]
impl CallAgent for EchoAgent {
    async fn greeting(&self, _session: &CallSession) -> Option<AgentReply> {
        None
    }

    async fn process_audio(&self, _session: &CallSession, chunk: &[u8]) -> Option<AgentReply> {
        Some(AgentReply::audio(chunk[..4].to_vec()))
    }
}

fn load_config() -> ConfigSet {
    ConfigSet::load_from_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/config"))
        .expect("load default config")
}

async fn serve(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = ecomatrix_locator::run_with_listener(listener, state).await;
    });
    addr
}

async fn start_server() -> (SocketAddr, Arc<CallSessionStore>) {
    let state = AppState::with_agent(load_config(), Arc::new(EchoAgent));
    let sessions = Arc::clone(&state.sessions);
    (serve(state).await, sessions)
}

async fn wait_until_empty(sessions: &CallSessionStore) {
    for _ in 0..50 {
        if sessions.active_sessions() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("sessions still active: {:?}", sessions.stream_ids());
}

async fn wait_for_session(sessions: &CallSessionStore, stream_id: &str) {
    for _ in 0..50 {
        if sessions.contains(stream_id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session {stream_id} was never created");
}

fn text(value: Value) -> Message {
    Message::Text(value.to_string().into())
}

#[tokio::test]
async fn media_is_chunked_and_stop_evicts_the_session() {
    let (addr, sessions) = start_server().await;
    let (mut ws, _resp) = connect_async(format!("ws://{}/media", addr))
        .await
        .expect("connect ok");

    ws.send(text(json!({"event": "connected", "streamSid": "call-1"})))
        .await
        .unwrap();
    ws.send(text(
        json!({"event": "start", "start": {"stream_sid": "call-1", "call_sid": "CA1"}}),
    ))
    .await
    .unwrap();

    // 3200バイト（200ms）で1チャンク
    let audio: Vec<u8> = (0..3200u32).map(|i| (i % 251) as u8).collect();
    let payload = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &audio);
    ws.send(text(json!({
        "event": "media",
        "streamSid": "call-1",
        "media": {"payload": payload, "timestamp": "20", "sequenceNumber": "1"}
    })))
    .await
    .unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("reply in time")
        .expect("stream open")
        .expect("valid frame");
    let Message::Text(body) = reply else {
        panic!("expected text frame");
    };
    let frame: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(frame["event"], "media");
    assert_eq!(frame["streamSid"], "call-1");
    assert_eq!(frame["media"]["sequenceNumber"], "1");
    let echoed = decode_payload(frame["media"]["payload"].as_str().unwrap()).unwrap();
    assert_eq!(echoed, audio[..4].to_vec());

    let session = sessions.get("call-1").expect("session active");
    assert_eq!(session.call_sid.as_deref(), Some("CA1"));
    assert_eq!(session.chunks_flushed, 1);

    ws.send(text(json!({"event": "stop", "streamSid": "call-1"})))
        .await
        .unwrap();
    wait_until_empty(&sessions).await;
}

#[tokio::test]
async fn closing_the_socket_releases_the_session() {
    let (addr, sessions) = start_server().await;
    let (mut ws, _resp) = connect_async(format!("ws://{}/media", addr))
        .await
        .expect("connect ok");

    ws.send(Message::Text("{not json".to_string().into()))
        .await
        .unwrap();
    ws.send(text(json!({"event": "mark", "streamSid": "call-2", "mark": {"name": "m1"}})))
        .await
        .unwrap();
    wait_for_session(&sessions, "call-2").await;
    assert_eq!(sessions.get("call-2").unwrap().last_mark.as_deref(), Some("m1"));

    ws.close(None).await.unwrap();
    wait_until_empty(&sessions).await;
}

#[tokio::test]
async fn full_store_refuses_the_upgrade() {
    let mut config = load_config();
    config.telephony.max_sessions = 1;
    let state = AppState::with_agent(config, Arc::new(EchoAgent));
    state.sessions.create("busy").unwrap();
    let sessions = Arc::clone(&state.sessions);
    let addr = serve(state).await;

    let response = match connect_async(format!("ws://{}/media", addr)).await {
        Err(tungstenite::Error::Http(response)) => response,
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("upgrade should be refused"),
    };
    assert_eq!(response.status(), 429);
    if let Some(body) = response.body() {
        let json: Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json["code"], "SERVER_OVERLOADED");
    }
    assert_eq!(sessions.stream_ids(), vec!["busy".to_string()]);
}
