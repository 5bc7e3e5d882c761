//! 通話エージェントの差し替え境界
//!
//! 音声認識・応答生成・音声合成の実装はこのトレイトの背後に置く。
//! 既定の `GreetingAgent` は挨拶文をログに残すだけで音声は返さない。
use async_trait::async_trait;
use tracing::info;

use crate::locator::NearbyResponse;
use crate::session::CallSession;

/// エージェントからの応答
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentReply {
    /// 認識した発話。セッションの直近クエリに記録される
    pub transcript: Option<String>,
    pub text: Option<String>,
    /// 8kHz 16bit PCM。空なら送信しない
    pub audio: Vec<u8>,
}

impl AgentReply {
    pub fn audio(audio: Vec<u8>) -> Self {
        Self {
            audio,
            ..Self::default()
        }
    }

    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }
}

#[async_trait]
pub trait CallAgent: Send + Sync {
    /// 接続直後の挨拶
    async fn greeting(&self, session: &CallSession) -> Option<AgentReply>;

    /// バッファ済み音声チャンク1つを処理
    async fn process_audio(&self, session: &CallSession, chunk: &[u8]) -> Option<AgentReply>;

    /// 場所探しの発話に対する検索結果を受け取り、応答を返す
    async fn location_results(
        &self,
        _session: &CallSession,
        _transcript: &str,
        _results: &NearbyResponse,
    ) -> Option<AgentReply> {
        None
    }

    /// 発話割り込み（`clear`）の通知
    async fn interrupted(&self, _session: &CallSession) {}
}

#[derive(Debug, Clone, Default)]
pub struct GreetingAgent {
    greeting: Option<String>,
}

impl GreetingAgent {
    pub fn new(greeting: Option<String>) -> Self {
        Self { greeting }
    }
}

#[async_trait]
impl CallAgent for GreetingAgent {
    async fn greeting(&self, session: &CallSession) -> Option<AgentReply> {
        let text = self.greeting.clone()?;
        info!(stream_id = %session.stream_id, greeting = %text, "挨拶を送信");
        Some(AgentReply {
            text: Some(text),
            ..AgentReply::default()
        })
    }

    async fn process_audio(&self, _session: &CallSession, _chunk: &[u8]) -> Option<AgentReply> {
        None
    }
}
