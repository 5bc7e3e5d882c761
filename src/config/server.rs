use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP/WebSocketサーバのバインドアドレス（例: 0.0.0.0:8000）
    pub bind_addr: String,
    /// `/` と `/health` で返すバージョン文字列
    #[serde(default = "ServerConfig::default_version")]
    pub version: String,
}

impl ServerConfig {
    fn default_version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}
