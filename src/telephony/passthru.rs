//! Exotel passthru Webhook のクエリパラメータ解析
use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// ストリームが終了したことを示すステータス
const TERMINAL_STATUSES: &[&str] = &["completed", "stopped", "failed", "cancelled", "disconnected"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamMetadata {
    pub stream_sid: Option<String>,
    pub status: Option<String>,
    pub duration: Option<String>,
    pub stream_url: Option<String>,
    pub recording_url: Option<String>,
    pub disconnected_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallMetadata {
    pub call_sid: Option<String>,
    pub direction: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub stream: StreamMetadata,
}

impl CallMetadata {
    /// `Stream[Key]` 形式と JSON の `Stream` パラメータの両方を受け付ける
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            params
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut stream = StreamMetadata {
            stream_sid: get("Stream[StreamSID]"),
            status: get("Stream[Status]"),
            duration: get("Stream[Duration]"),
            stream_url: get("Stream[StreamUrl]"),
            recording_url: get("Stream[RecordingUrl]"),
            disconnected_by: get("Stream[DisconnectedBy]"),
        };

        if let Some(raw) = get("Stream") {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&raw) {
                let field = |key: &str| map.get(key).and_then(value_text);
                stream.stream_sid = stream.stream_sid.or_else(|| field("StreamSID"));
                stream.status = stream.status.or_else(|| field("Status"));
                stream.duration = stream.duration.or_else(|| field("Duration"));
                stream.stream_url = stream.stream_url.or_else(|| field("StreamUrl"));
                stream.recording_url = stream.recording_url.or_else(|| field("RecordingUrl"));
                stream.disconnected_by = stream.disconnected_by.or_else(|| field("DisconnectedBy"));
            }
        }

        Self {
            call_sid: get("CallSid"),
            direction: get("Direction"),
            from: get("From"),
            to: get("To"),
            stream,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stream.status.as_deref().is_some_and(|status| {
            TERMINAL_STATUSES
                .iter()
                .any(|terminal| status.eq_ignore_ascii_case(terminal))
        })
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
