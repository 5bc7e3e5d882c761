//! Exotel 電話連携
//!
//! - `messages`: メディアストリームの受信イベント・送信フレーム
//! - `audio`: 受信PCMのチャンク化
//! - `agent`: 通話エージェントの差し替え境界（`CallAgent`）
//! - `stream`: 1接続分のイベント処理とセッション所有
//! - `passthru`: passthru Webhook の解析
//!
//! `MediaStreamHandler` が WebSocket を送信タスクと受信ループに分割して駆動する。
mod agent;
mod audio;
mod messages;
mod passthru;
mod stream;

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::TelephonyConfig;
use crate::locator::LocationService;
use crate::session::CallSessionStore;

pub use agent::{AgentReply, CallAgent, GreetingAgent};
pub use audio::AudioChunker;
pub use messages::{
    decode_payload, encode_outbound_media, StreamEnvelope, StreamEvent, StreamEventError,
};
pub use passthru::{CallMetadata, StreamMetadata};
pub use stream::{MediaStreamSession, Step};

const OUTBOUND_QUEUE: usize = 100;

#[derive(Clone)]
pub struct MediaStreamHandler {
    sessions: Arc<CallSessionStore>,
    locator: Arc<LocationService>,
    agent: Arc<dyn CallAgent>,
    chunk_bytes: usize,
}

impl MediaStreamHandler {
    pub fn new(
        sessions: Arc<CallSessionStore>,
        locator: Arc<LocationService>,
        agent: Arc<dyn CallAgent>,
        telephony: &TelephonyConfig,
    ) -> Self {
        Self {
            sessions,
            locator,
            agent,
            chunk_bytes: telephony.bytes_per_chunk(),
        }
    }

    /// WebSocket接続を処理（終了時にセッションは必ず解放される）
    pub async fn handle_socket(self, socket: WebSocket) {
        let connection_id = Uuid::new_v4().to_string();
        info!(connection_id = %connection_id, "メディアストリーム接続開始");

        let (mut ws_sender, mut ws_receiver) = socket.split();
        let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);

        // 送信タスク（サーバー→Exotel）
        let connection_for_send = connection_id.clone();
        let send_task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                    warn!(connection_id = %connection_for_send, "WebSocket送信失敗");
                    break;
                }
            }
        });

        let mut stream = MediaStreamSession::new(
            connection_id.clone(),
            self.sessions,
            self.locator,
            self.agent,
            self.chunk_bytes,
        );

        'recv: while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match stream.handle_text(text.as_str()).await {
                    Ok(step) => {
                        for frame in step.outbound {
                            if tx.send(frame).await.is_err() {
                                break 'recv;
                            }
                        }
                        if step.finished {
                            break;
                        }
                    }
                    Err(StreamEventError::Session(e)) => {
                        warn!(connection_id = %connection_id, error = %e, "セッションが利用できないため切断");
                        break;
                    }
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "メッセージを破棄");
                    }
                },
                Ok(Message::Close(_)) => {
                    info!(connection_id = %connection_id, "WebSocket切断");
                    break;
                }
                Err(e) => {
                    error!(connection_id = %connection_id, error = %e, "WebSocketエラー");
                    break;
                }
                _ => {}
            }
        }

        // ガード破棄でセッションを削除してから送信側を閉じる
        drop(stream);
        drop(tx);
        if let Err(e) = send_task.await {
            error!(connection_id = %connection_id, error = %e, "送信タスク異常終了");
        }
        info!(connection_id = %connection_id, "メディアストリーム接続終了");
    }
}
