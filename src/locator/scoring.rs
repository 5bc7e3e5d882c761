//! クエリ文字列によるキーワードスコアリングと並べ替え
//!
//! スコア規則:
//! - キーワード群ごとに、クエリに含まれるキーワード1つにつき
//!   地点テキストにキーワードかカテゴリ名が含まれれば +10、
//!   そうでなく地点種別がカテゴリ名と一致すれば +5
//! - `min_token_len` より長いクエリトークンが地点テキストに含まれるごとに +3
//! - いずれかのトークン（長さ不問）が地点種別に含まれれば +5（1回のみ）
//!
//! トークン数が2以下のクエリでは全件を残し、3以上のときだけスコア0の地点を除外する。
use crate::config::{KeywordGroup, RankingConfig};

use super::poi::{PointOfInterest, RankedLocation};

const KEYWORD_HIT: u32 = 10;
const CATEGORY_HIT: u32 = 5;
const TOKEN_HIT: u32 = 3;
const TYPE_HIT: u32 = 5;

/// この数を超えるトークンを持つクエリではスコア0を除外する
const SHORT_QUERY_TOKENS: usize = 2;

#[derive(Debug, Clone)]
pub struct KeywordScorer {
    groups: Vec<KeywordGroup>,
    min_token_len: usize,
}

impl KeywordScorer {
    pub fn new(groups: Vec<KeywordGroup>, min_token_len: usize) -> Self {
        let groups = groups
            .into_iter()
            .map(|group| KeywordGroup {
                category: group.category.to_lowercase(),
                keywords: group.keywords.iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();
        Self {
            groups,
            min_token_len,
        }
    }

    pub fn from_config(config: &RankingConfig) -> Self {
        Self::new(config.keyword_groups.clone(), config.min_token_len)
    }

    /// 1地点のスコアを算出（`query` は小文字化済み）
    pub fn score(&self, location: &PointOfInterest, query: &str) -> u32 {
        let text = location.search_text();
        let kind = location.kind.as_str();
        let mut score = 0;

        for group in &self.groups {
            for keyword in group.keywords.iter().filter(|k| query.contains(k.as_str())) {
                if text.contains(keyword.as_str()) || text.contains(group.category.as_str()) {
                    score += KEYWORD_HIT;
                } else if kind == group.category {
                    score += CATEGORY_HIT;
                }
            }
        }

        let tokens = self.significant_tokens(query);
        score += TOKEN_HIT * tokens.iter().filter(|t| text.contains(**t)).count() as u32;
        if query.split_whitespace().any(|t| kind.contains(t)) {
            score += TYPE_HIT;
        }

        score
    }

    /// 距離順に並んだ候補へスコアを付与し、(スコア降順, 距離昇順) に並べ替える
    pub fn rank(&self, candidates: Vec<RankedLocation>, query: &str) -> Vec<RankedLocation> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return candidates;
        }

        let keep_unscored = query.split_whitespace().count() <= SHORT_QUERY_TOKENS;
        let mut ranked: Vec<RankedLocation> = candidates
            .into_iter()
            .map(|mut candidate| {
                candidate.relevance_score = Some(self.score(&candidate.location, &query));
                candidate
            })
            .filter(|candidate| keep_unscored || candidate.relevance_score.unwrap_or(0) > 0)
            .collect();

        // 安定ソート: 同点・同距離はカタログ順を維持
        ranked.sort_by(|a, b| {
            let sa = a.relevance_score.unwrap_or(0);
            let sb = b.relevance_score.unwrap_or(0);
            sb.cmp(&sa).then(a.distance.total_cmp(&b.distance))
        });
        ranked
    }

    fn significant_tokens<'q>(&self, query: &'q str) -> Vec<&'q str> {
        query
            .split_whitespace()
            .filter(|token| token.chars().count() > self.min_token_len)
            .collect()
    }
}
