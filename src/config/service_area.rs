//! サービスエリア（中心点と矩形境界）の設定
use serde::{Deserialize, Serialize};

use crate::locator::Coordinate;

use super::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAreaConfig {
    pub center: Coordinate,
    pub bounds: Bounds,
}

/// 緯度経度の矩形境界。境界線上は圏内として扱う
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    pub fn contains(&self, point: Coordinate) -> bool {
        (self.south..=self.north).contains(&point.lat)
            && (self.west..=self.east).contains(&point.lng)
    }
}

impl ServiceAreaConfig {
    /// 環境変数（`BOUNDS_NORTH` など）で境界・中心点を上書き
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// `lookup` が値を返したキーだけを上書きする
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut f64); 6] = [
            ("BOUNDS_NORTH", &mut self.bounds.north),
            ("BOUNDS_SOUTH", &mut self.bounds.south),
            ("BOUNDS_EAST", &mut self.bounds.east),
            ("BOUNDS_WEST", &mut self.bounds.west),
            ("DEFAULT_LAT", &mut self.center.lat),
            ("DEFAULT_LNG", &mut self.center.lng),
        ];

        for (key, slot) in targets {
            if let Some(raw) = lookup(key) {
                let value = raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ConfigError::Override {
                        key: key.to_string(),
                        value: raw.clone(),
                    })?;
                *slot = value;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.bounds;
        if b.north <= b.south {
            return Err(ConfigError::invalid("service_area.bounds: north must be greater than south"));
        }
        if b.east <= b.west {
            return Err(ConfigError::invalid("service_area.bounds: east must be greater than west"));
        }
        if !self.center.is_valid() {
            return Err(ConfigError::invalid("service_area.center is not a valid coordinate"));
        }
        if !b.contains(self.center) {
            return Err(ConfigError::invalid("service_area.center lies outside the bounds"));
        }
        Ok(())
    }
}
