//! 1接続分のメディアストリーム処理
//!
//! 受信イベントを順に適用し、送信すべきフレームを返す。ソケットからは独立しているので
//! 単体でテストできる。セッションは最初にストリームIDを含むイベントで開き、
//! `SessionGuard` をこの構造体が保持する（破棄でストアから削除）。
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::agent::{AgentReply, CallAgent};
use super::audio::AudioChunker;
use super::messages::{encode_outbound_media, StreamEnvelope, StreamEvent, StreamEventError};
use crate::locator::{is_location_query, LocationService, NearbyOutcome, NearbyQuery};
use crate::session::{CallSessionStore, ConversationState, SessionGuard};

/// イベント1件の処理結果
#[derive(Debug, Default)]
pub struct Step {
    pub outbound: Vec<String>,
    pub finished: bool,
}

pub struct MediaStreamSession {
    connection_id: String,
    sessions: Arc<CallSessionStore>,
    locator: Arc<LocationService>,
    agent: Arc<dyn CallAgent>,
    chunker: AudioChunker,
    guard: Option<SessionGuard>,
    connected: bool,
    greeted: bool,
    sequence: u64,
}

impl MediaStreamSession {
    pub fn new(
        connection_id: impl Into<String>,
        sessions: Arc<CallSessionStore>,
        locator: Arc<LocationService>,
        agent: Arc<dyn CallAgent>,
        chunk_bytes: usize,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            sessions,
            locator,
            agent,
            chunker: AudioChunker::new(chunk_bytes),
            guard: None,
            connected: false,
            greeted: false,
            sequence: 0,
        }
    }

    pub fn stream_id(&self) -> Option<&str> {
        self.guard.as_ref().map(SessionGuard::stream_id)
    }

    /// テキストフレーム1件を処理
    pub async fn handle_text(&mut self, text: &str) -> Result<Step, StreamEventError> {
        let envelope = StreamEnvelope::parse(text)?;
        let mut step = Step::default();

        if let Some(stream_id) = envelope.stream_id.as_deref() {
            if !self.attach(stream_id)? {
                return Ok(step);
            }
        }

        match envelope.event {
            StreamEvent::Connected => {
                info!(connection_id = %self.connection_id, "Exotel connected");
                self.connected = true;
            }
            StreamEvent::Start { call_sid } => {
                if let Some(guard) = &self.guard {
                    info!(
                        stream_id = %guard.stream_id(),
                        call_sid = call_sid.as_deref().unwrap_or("unknown"),
                        "ストリーム開始"
                    );
                    guard.update(|session| session.call_sid = call_sid)?;
                }
                self.connected = true;
            }
            StreamEvent::Media(audio) => self.on_media(&audio, &mut step).await?,
            StreamEvent::Mark { name } => {
                if let Some(guard) = &self.guard {
                    debug!(stream_id = %guard.stream_id(), mark = ?name, "mark");
                    guard.update(|session| session.last_mark = name)?;
                }
            }
            StreamEvent::Clear => {
                self.chunker.clear();
                if let Some(guard) = &self.guard {
                    let snapshot = guard.update(|session| {
                        session.state = ConversationState::Listening;
                        session.clone()
                    })?;
                    info!(stream_id = %snapshot.stream_id, "割り込み（clear）");
                    self.agent.interrupted(&snapshot).await;
                }
            }
            StreamEvent::Stop => {
                if let Some(guard) = self.guard.take() {
                    info!(stream_id = %guard.stream_id(), "ストリーム停止");
                    drop(guard);
                }
                step.finished = true;
                return Ok(step);
            }
            StreamEvent::Unknown(event) => {
                debug!(connection_id = %self.connection_id, event = %event, "未対応イベント");
            }
        }

        if self.connected && !self.greeted {
            self.greet(&mut step).await?;
        }
        Ok(step)
    }

    /// ストリームIDでセッションを開く。別IDのイベントは無視して false を返す
    fn attach(&mut self, stream_id: &str) -> Result<bool, StreamEventError> {
        match &self.guard {
            Some(guard) if guard.stream_id() == stream_id => Ok(true),
            Some(guard) => {
                warn!(
                    connection_id = %self.connection_id,
                    expected = %guard.stream_id(),
                    received = %stream_id,
                    "別ストリームのイベントを無視"
                );
                Ok(false)
            }
            None => {
                self.guard = Some(self.sessions.open(stream_id)?);
                Ok(true)
            }
        }
    }

    async fn greet(&mut self, step: &mut Step) -> Result<(), StreamEventError> {
        let Some(guard) = &self.guard else {
            return Ok(());
        };
        let snapshot = guard.update(|session| session.clone())?;
        if let Some(reply) = self.agent.greeting(&snapshot).await {
            push_reply(guard.stream_id(), &reply, &mut self.sequence, step)?;
        }
        guard.update(|session| session.state = ConversationState::Listening)?;
        self.greeted = true;
        Ok(())
    }

    async fn on_media(&mut self, audio: &[u8], step: &mut Step) -> Result<(), StreamEventError> {
        let Some(guard) = &self.guard else {
            debug!(connection_id = %self.connection_id, "セッション未確立のため音声を破棄");
            return Ok(());
        };
        guard.update(|session| session.media_frames += 1)?;

        for chunk in self.chunker.push(audio) {
            let snapshot = guard.update(|session| {
                session.chunks_flushed += 1;
                session.state = ConversationState::Responding;
                session.clone()
            })?;
            let Some(reply) = self.agent.process_audio(&snapshot, &chunk).await else {
                guard.update(|session| session.state = ConversationState::Listening)?;
                continue;
            };
            push_reply(guard.stream_id(), &reply, &mut self.sequence, step)?;

            if let Some(transcript) = reply.transcript.as_deref() {
                info!(stream_id = %guard.stream_id(), transcript, "発話を認識");
                guard.update(|session| session.push_query(transcript))?;

                // 発信者の位置は分からないため、エリア内のランダム地点から検索する
                if is_location_query(transcript) {
                    let point = self.locator.random_point(&mut rand::rng());
                    let query = NearbyQuery::new(point.lat, point.lng, transcript);
                    match self.locator.find_nearby(&query) {
                        Ok(NearbyOutcome::Found(found)) => {
                            info!(
                                stream_id = %guard.stream_id(),
                                total_found = found.total_found,
                                "場所検索"
                            );
                            let snapshot = guard.update(|session| {
                                session.user_location = Some(point);
                                session.clone()
                            })?;
                            if let Some(reply) =
                                self.agent.location_results(&snapshot, transcript, &found).await
                            {
                                push_reply(guard.stream_id(), &reply, &mut self.sequence, step)?;
                            }
                        }
                        Ok(NearbyOutcome::OutOfArea(_)) => {}
                        Err(e) => {
                            warn!(stream_id = %guard.stream_id(), error = %e, "場所検索に失敗");
                        }
                    }
                }
            }
            guard.update(|session| session.state = ConversationState::Listening)?;
        }
        Ok(())
    }
}

fn push_reply(
    stream_id: &str,
    reply: &AgentReply,
    sequence: &mut u64,
    step: &mut Step,
) -> Result<(), StreamEventError> {
    if let Some(text) = reply.text.as_deref() {
        debug!(stream_id, text, "agent reply");
    }
    if !reply.has_audio() {
        return Ok(());
    }
    *sequence += 1;
    let timestamp_ms = chrono::Utc::now().timestamp_millis();
    step.outbound.push(encode_outbound_media(
        stream_id,
        &reply.audio,
        *sequence,
        timestamp_ms,
    )?);
    Ok(())
}
