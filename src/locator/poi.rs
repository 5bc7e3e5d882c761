use std::fmt;

use serde::{Deserialize, Serialize};

use super::geo::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoiKind {
    Shop,
    House,
}

impl PoiKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoiKind::Shop => "shop",
            PoiKind::House => "house",
        }
    }
}

impl fmt::Display for PoiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 設定から読み込まれる地点。起動後は変更されない
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PoiKind,
    pub lat: f64,
    pub lng: f64,
    pub description: String,
}

impl PointOfInterest {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }

    /// キーワード照合に使う小文字テキスト（名前・説明・種別）
    pub fn search_text(&self) -> String {
        format!("{} {} {}", self.name, self.description, self.kind).to_lowercase()
    }
}

/// 1リクエストごとに生成される距離付きの地点
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedLocation {
    #[serde(flatten)]
    pub location: PointOfInterest,
    /// km（小数点以下3桁）
    pub distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<u32>,
}

/// 地点詳細（音声応答向けの説明文付き）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationDetails {
    #[serde(flatten)]
    pub location: PointOfInterest,
    pub detailed_info: String,
}
