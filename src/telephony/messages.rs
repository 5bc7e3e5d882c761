//! Exotel 双方向メディアストリームの JSON メッセージ
//!
//! 受信: `connected` / `start` / `media` / `mark` / `clear` / `stop`
//! 送信: `media`（base64 PCM）
//!
//! ストリームIDは `streamSid`・`stream_sid`・`start.stream_sid` のいずれかから取得する。
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum StreamEventError {
    #[error("invalid stream message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid media payload: {0}")]
    Payload(#[from] base64::DecodeError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Connected,
    Start { call_sid: Option<String> },
    Media(Vec<u8>),
    Mark { name: Option<String> },
    Clear,
    Stop,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEnvelope {
    pub stream_id: Option<String>,
    pub event: StreamEvent,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    event: String,
    #[serde(default, rename = "streamSid", alias = "stream_sid")]
    stream_sid: Option<String>,
    #[serde(default)]
    start: Option<RawStart>,
    #[serde(default)]
    media: Option<RawMedia>,
    #[serde(default)]
    mark: Option<RawMark>,
}

#[derive(Debug, Deserialize)]
struct RawStart {
    #[serde(default, rename = "streamSid", alias = "stream_sid")]
    stream_sid: Option<String>,
    #[serde(default, rename = "callSid", alias = "call_sid")]
    call_sid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    #[serde(default)]
    payload: String,
}

#[derive(Debug, Deserialize)]
struct RawMark {
    #[serde(default)]
    name: Option<String>,
}

impl StreamEnvelope {
    pub fn parse(text: &str) -> Result<Self, StreamEventError> {
        let raw: RawFrame = serde_json::from_str(text)?;

        let start_sid = raw.start.as_ref().and_then(|s| s.stream_sid.clone());
        let stream_id = raw
            .stream_sid
            .or(start_sid)
            .filter(|id| !id.trim().is_empty());

        let event = match raw.event.as_str() {
            "connected" => StreamEvent::Connected,
            "start" => StreamEvent::Start {
                call_sid: raw.start.and_then(|s| s.call_sid),
            },
            "media" => {
                let payload = raw.media.map(|m| m.payload).unwrap_or_default();
                StreamEvent::Media(STANDARD.decode(payload.trim())?)
            }
            "mark" => StreamEvent::Mark {
                name: raw.mark.and_then(|m| m.name),
            },
            "clear" => StreamEvent::Clear,
            "stop" => StreamEvent::Stop,
            other => StreamEvent::Unknown(other.to_string()),
        };

        Ok(Self { stream_id, event })
    }
}

#[derive(Debug, Serialize)]
struct OutboundMedia<'a> {
    event: &'static str,
    #[serde(rename = "streamSid")]
    stream_sid: &'a str,
    media: OutboundMediaBody,
}

#[derive(Debug, Serialize)]
struct OutboundMediaBody {
    payload: String,
    timestamp: String,
    #[serde(rename = "sequenceNumber")]
    sequence_number: String,
}

/// 送信用 `media` メッセージを生成（タイムスタンプはミリ秒）
pub fn encode_outbound_media(
    stream_id: &str,
    audio: &[u8],
    sequence_number: u64,
    timestamp_ms: i64,
) -> Result<String, StreamEventError> {
    let message = OutboundMedia {
        event: "media",
        stream_sid: stream_id,
        media: OutboundMediaBody {
            payload: STANDARD.encode(audio),
            timestamp: timestamp_ms.to_string(),
            sequence_number: sequence_number.to_string(),
        },
    };
    Ok(serde_json::to_string(&message)?)
}

/// 受信側が使う base64 デコード（テスト・ツール用）
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, StreamEventError> {
    Ok(STANDARD.decode(payload.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_event_is_decoded() {
        let text = r#"{"event":"media","streamSid":"test_stream_123","media":{"payload":"dGVzdCBhdWRpbyBkYXRh","timestamp":"1","sequenceNumber":"1"}}"#;
        let envelope = StreamEnvelope::parse(text).unwrap();
        assert_eq!(envelope.stream_id.as_deref(), Some("test_stream_123"));
        assert_eq!(envelope.event, StreamEvent::Media(b"test audio data".to_vec()));
    }

    #[test]
    fn stream_id_from_snake_case_and_start_block() {
        let snake = StreamEnvelope::parse(r#"{"event":"stop","stream_sid":"s-9"}"#).unwrap();
        assert_eq!(snake.stream_id.as_deref(), Some("s-9"));
        assert_eq!(snake.event, StreamEvent::Stop);

        let start = StreamEnvelope::parse(
            r#"{"event":"start","start":{"stream_sid":"s-10","call_sid":"CA1"}}"#,
        )
        .unwrap();
        assert_eq!(start.stream_id.as_deref(), Some("s-10"));
        assert_eq!(
            start.event,
            StreamEvent::Start {
                call_sid: Some("CA1".into())
            }
        );
    }

    #[test]
    fn unknown_event_and_missing_id() {
        let envelope = StreamEnvelope::parse(r#"{"event":"dtmf"}"#).unwrap();
        assert_eq!(envelope.stream_id, None);
        assert_eq!(envelope.event, StreamEvent::Unknown("dtmf".into()));
    }

    #[test]
    fn malformed_json_and_payload() {
        assert!(matches!(
            StreamEnvelope::parse("{not json"),
            Err(StreamEventError::Json(_))
        ));
        assert!(matches!(
            StreamEnvelope::parse(r#"{"event":"media","streamSid":"s","media":{"payload":"%%%"}}"#),
            Err(StreamEventError::Payload(_))
        ));
    }

    #[test]
    fn outbound_media_shape() {
        let json = encode_outbound_media("s-1", b"abc", 7, 1_700_000_000_000).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "media");
        assert_eq!(value["streamSid"], "s-1");
        assert_eq!(value["media"]["payload"], "YWJj");
        assert_eq!(value["media"]["sequenceNumber"], "7");
        assert_eq!(value["media"]["timestamp"], "1700000000000");
    }
}
