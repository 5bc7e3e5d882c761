//! Exotel メディアストリームの音声バッファリング・セッション上限設定
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TelephonyConfig {
    /// 電話回線のサンプリングレート（8kHz）
    pub sample_rate_hz: u32,
    /// エージェントへ渡すチャンク長（ミリ秒）
    pub buffer_size_ms: u32,
    /// 同時に保持できる通話セッション数
    pub max_sessions: usize,
    /// 接続直後にエージェントへ渡す挨拶文
    #[serde(default)]
    pub greeting: Option<String>,
}

impl TelephonyConfig {
    /// 16bit PCM モノラル前提で 1 チャンクあたりのバイト数を算出
    pub fn bytes_per_chunk(&self) -> usize {
        (self.sample_rate_hz as usize * 2 * self.buffer_size_ms as usize) / 1000
    }
}
