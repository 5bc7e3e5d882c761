use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::locator::Coordinate;

/// 保持する直近クエリ数
pub const RECENT_QUERY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationState {
    Greeting,
    Listening,
    Responding,
}

/// 1通話（Exotel ストリーム）分の状態
#[derive(Debug, Clone)]
pub struct CallSession {
    pub stream_id: String,
    pub call_sid: Option<String>,
    pub state: ConversationState,
    pub media_frames: u64,
    pub chunks_flushed: u64,
    pub last_mark: Option<String>,
    /// 直近の場所検索で使った発信者位置
    pub user_location: Option<Coordinate>,
    recent_queries: VecDeque<String>,
    created_at: Instant,
}

impl CallSession {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            call_sid: None,
            state: ConversationState::Greeting,
            media_frames: 0,
            chunks_flushed: 0,
            last_mark: None,
            user_location: None,
            recent_queries: VecDeque::with_capacity(RECENT_QUERY_LIMIT),
            created_at: Instant::now(),
        }
    }

    /// 直近クエリを追加（上限を超えた分は古い順に破棄）
    pub fn push_query(&mut self, query: impl Into<String>) {
        if self.recent_queries.len() == RECENT_QUERY_LIMIT {
            self.recent_queries.pop_front();
        }
        self.recent_queries.push_back(query.into());
    }

    pub fn recent_queries(&self) -> impl Iterator<Item = &str> {
        self.recent_queries.iter().map(String::as_str)
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
