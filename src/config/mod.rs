//! 設定モジュール（YAML 読み込み）
//!
//! `ConfigSet` は設定ディレクトリ配下の複数YAMLファイルを読み込み、
//! サービスエリア・地点カタログ・ランキング・通話設定を型安全に提供します。
//! サービスエリアは環境変数（`BOUNDS_NORTH` など）で上書きできます。
mod error;
mod ranking;
mod server;
mod service_area;
mod telephony;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::locator::PointOfInterest;

pub use error::ConfigError;
pub use ranking::*;
pub use server::*;
pub use service_area::*;
pub use telephony::*;

/// 設定ディレクトリを指す環境変数名
pub const CONFIG_DIR_ENV: &str = "ECOMATRIX_CONFIG_DIR";

/// すべての設定をひとまとめにした構造体
#[derive(Debug, Clone)]
pub struct ConfigSet {
    pub server: ServerConfig,
    pub service_area: ServiceAreaConfig,
    pub ranking: RankingConfig,
    pub telephony: TelephonyConfig,
    pub locations: Vec<PointOfInterest>,
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct LocationsFile {
    locations: Vec<PointOfInterest>,
}

impl ConfigSet {
    /// ルートディレクトリから各YAMLを読み込み（環境変数による上書きは行わない）
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let root = dir.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ConfigError::MissingRoot(root));
        }

        let server = load_yaml(root.join("server.yaml"))?;
        let service_area = load_yaml(root.join("service_area.yaml"))?;
        let ranking = load_yaml(root.join("ranking.yaml"))?;
        let telephony = load_yaml(root.join("telephony.yaml"))?;
        let LocationsFile { locations } = load_yaml(root.join("locations.yaml"))?;

        let config = Self {
            server,
            service_area,
            ranking,
            telephony,
            locations,
            root,
        };
        config.validate()?;
        Ok(config)
    }

    /// 環境変数（未設定時は `config/`）から設定を読み込み、サービスエリアの上書きを適用
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let dir = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| "config".to_string());
        let mut config = Self::load_from_dir(dir)?;
        config.service_area.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_addr.trim().is_empty() {
            return Err(ConfigError::invalid("server.bind_addr is empty"));
        }

        self.service_area.validate()?;

        if self.ranking.top_n == 0 {
            return Err(ConfigError::invalid("ranking.top_n must be positive"));
        }
        if self
            .ranking
            .keyword_groups
            .iter()
            .any(|group| group.category.trim().is_empty())
        {
            return Err(ConfigError::invalid("ranking.keyword_groups contains an empty category"));
        }

        if self.telephony.sample_rate_hz == 0 || self.telephony.buffer_size_ms == 0 {
            return Err(ConfigError::invalid(
                "telephony.sample_rate_hz and telephony.buffer_size_ms must be positive",
            ));
        }
        if self.telephony.max_sessions == 0 {
            return Err(ConfigError::invalid("telephony.max_sessions must be positive"));
        }

        let mut seen = HashSet::new();
        for location in &self.locations {
            if !seen.insert(location.id) {
                return Err(ConfigError::invalid(format!(
                    "duplicate location id {}",
                    location.id
                )));
            }
            if !location.coordinate().is_valid() {
                return Err(ConfigError::invalid(format!(
                    "location {} has an invalid coordinate",
                    location.id
                )));
            }
        }

        Ok(())
    }

    /// 設定ルートのパス（デバッグ等に利用）
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// YAMLファイルを読み込み、型 `T` へデシリアライズ
fn load_yaml<T>(path: PathBuf) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let data = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse { path, source })
}
