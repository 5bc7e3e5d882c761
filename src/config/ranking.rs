//! キーワードスコアリングと件数上限の設定
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    /// レスポンスに含める最大件数
    pub top_n: usize,
    /// 汎用一致判定で無視するトークン長（この長さ以下は無視）
    #[serde(default = "RankingConfig::default_min_token_len")]
    pub min_token_len: usize,
    /// カテゴリごとのキーワード（YAML の記述順を保持）
    pub keyword_groups: Vec<KeywordGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordGroup {
    pub category: String,
    pub keywords: Vec<String>,
}

impl RankingConfig {
    const fn default_min_token_len() -> usize {
        2
    }
}
