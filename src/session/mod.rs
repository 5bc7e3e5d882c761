//! 通話セッションストア
//!
//! ストリームID（Exotel の `streamSid`）をキーに `CallSession` を保持します。
//! - `create` / `get` / `update` / `evict` で明示的に操作
//! - `open` が返す `SessionGuard` は破棄時に必ずエントリを削除する
//!   （WebSocket 接続の終了経路がエラー・切断・パニックのいずれでも解放される）
//!
//! `Drop` から削除できるよう同期ロック（`parking_lot::RwLock`）を使い、
//! `.await` をまたいでロックを保持しない。
mod error;
mod session;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

pub use error::SessionError;
pub use session::{CallSession, ConversationState, RECENT_QUERY_LIMIT};

#[derive(Debug)]
pub struct CallSessionStore {
    max_sessions: usize,
    sessions: RwLock<HashMap<String, CallSession>>,
}

impl CallSessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// 新規セッションを登録
    pub fn create(&self, stream_id: &str) -> Result<(), SessionError> {
        let mut guard = self.sessions.write();
        if guard.contains_key(stream_id) {
            return Err(SessionError::AlreadyExists {
                stream_id: stream_id.to_string(),
            });
        }
        if guard.len() >= self.max_sessions {
            return Err(SessionError::LimitExceeded {
                max: self.max_sessions,
            });
        }
        guard.insert(stream_id.to_string(), CallSession::new(stream_id));
        info!(stream_id, active = guard.len(), "call session created");
        Ok(())
    }

    /// セッションを登録し、破棄時に自動削除するガードを返す
    pub fn open(self: &Arc<Self>, stream_id: &str) -> Result<SessionGuard, SessionError> {
        self.create(stream_id)?;
        Ok(SessionGuard {
            store: Arc::clone(self),
            stream_id: stream_id.to_string(),
        })
    }

    /// スナップショットを取得
    pub fn get(&self, stream_id: &str) -> Option<CallSession> {
        self.sessions.read().get(stream_id).cloned()
    }

    pub fn contains(&self, stream_id: &str) -> bool {
        self.sessions.read().contains_key(stream_id)
    }

    /// クロージャでセッションを更新し、その戻り値を返す
    pub fn update<F, T>(&self, stream_id: &str, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut CallSession) -> T,
    {
        let mut guard = self.sessions.write();
        guard
            .get_mut(stream_id)
            .map(f)
            .ok_or_else(|| SessionError::not_found(stream_id))
    }

    /// セッションを削除（通話終了時）
    pub fn evict(&self, stream_id: &str) -> Result<CallSession, SessionError> {
        let mut guard = self.sessions.write();
        let session = guard
            .remove(stream_id)
            .ok_or_else(|| SessionError::not_found(stream_id))?;
        info!(
            stream_id,
            active = guard.len(),
            age_ms = session.age().as_millis() as u64,
            media_frames = session.media_frames,
            "call session evicted"
        );
        Ok(session)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn stream_ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }
}

/// 接続スコープのセッション所有権。破棄時にストアから削除する
#[derive(Debug)]
pub struct SessionGuard {
    store: Arc<CallSessionStore>,
    stream_id: String,
}

impl SessionGuard {
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn update<F, T>(&self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut CallSession) -> T,
    {
        self.store.update(&self.stream_id, f)
    }

    pub fn snapshot(&self) -> Option<CallSession> {
        self.store.get(&self.stream_id)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // stop イベントや passthru で既に削除済みの場合がある
        if self.store.evict(&self.stream_id).is_err() {
            debug!(stream_id = %self.stream_id, "session already evicted");
        }
    }
}
