//! 最寄り地点検索モジュール
//!
//! `LocationService` は起動時に読み込んだ地点カタログ（不変）とサービスエリアを保持し、
//! 座標と任意のクエリ文字列から距離順・関連度順の候補を返します。
//!
//! - 圏外の座標は距離計算をせず `NearbyOutcome::OutOfArea` を返す
//! - 距離は haversine（地球半径 6371km）、小数点以下3桁に丸める
//! - 同距離・同スコアはカタログ順（安定ソート）
//!
//! 共有状態を持たないため、`Arc` 越しに任意のタスクから同時に呼び出せます。
mod error;
mod geo;
mod intent;
mod message;
mod poi;
mod scoring;

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{Bounds, ConfigSet, RankingConfig, ServiceAreaConfig};

pub use error::LocatorError;
pub use geo::{haversine_km, round_km, Coordinate};
pub use intent::{detect_intent, is_location_query, DetectedIntent, IntentReport};
pub use message::{describe_results, detailed_info, OUT_OF_AREA_ERROR, OUT_OF_AREA_MESSAGE};
pub use poi::{LocationDetails, PoiKind, PointOfInterest, RankedLocation};
pub use scoring::KeywordScorer;

/// HTTPボディそのままの検索リクエスト（数値かどうかは未検証）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NearbyRequest {
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lng: Option<Value>,
    #[serde(default)]
    pub query: Option<String>,
}

/// 検証済みの検索条件
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub location: Coordinate,
    pub query: String,
}

impl NearbyQuery {
    pub fn new(lat: f64, lng: f64, query: impl Into<String>) -> Self {
        Self {
            location: Coordinate::new(lat, lng),
            query: query.into(),
        }
    }
}

impl TryFrom<NearbyRequest> for NearbyQuery {
    type Error = LocatorError;

    fn try_from(request: NearbyRequest) -> Result<Self, Self::Error> {
        let lat = numeric_field("lat", request.lat.as_ref())?;
        let lng = numeric_field("lng", request.lng.as_ref())?;
        Ok(Self::new(lat, lng, request.query.unwrap_or_default()))
    }
}

fn numeric_field(field: &'static str, value: Option<&Value>) -> Result<f64, LocatorError> {
    match value {
        None | Some(Value::Null) => Err(LocatorError::MissingCoordinate { field }),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or(LocatorError::NonNumericCoordinate { field }),
        Some(_) => Err(LocatorError::NonNumericCoordinate { field }),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyResponse {
    pub user_location: Coordinate,
    pub nearest_locations: Vec<RankedLocation>,
    pub total_found: usize,
    pub query: String,
    pub message: String,
    pub service_area: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutOfAreaResponse {
    pub error: String,
    pub service_area: Bounds,
    pub user_location: Coordinate,
    pub message: String,
}

/// 検索結果。圏外はエラーではなく別形の結果として返す
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NearbyOutcome {
    Found(NearbyResponse),
    OutOfArea(OutOfAreaResponse),
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceAreaInfo {
    pub area: ServiceAreaConfig,
    pub total_locations: usize,
    pub location_types: Vec<PoiKind>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LocationService {
    catalog: Arc<[PointOfInterest]>,
    area: ServiceAreaConfig,
    scorer: KeywordScorer,
    top_n: usize,
}

impl LocationService {
    pub fn new(
        catalog: Vec<PointOfInterest>,
        area: ServiceAreaConfig,
        ranking: &RankingConfig,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            area,
            scorer: KeywordScorer::from_config(ranking),
            top_n: ranking.top_n,
        }
    }

    pub fn from_config(config: &ConfigSet) -> Self {
        Self::new(
            config.locations.clone(),
            config.service_area.clone(),
            &config.ranking,
        )
    }

    pub fn locations(&self) -> &[PointOfInterest] {
        &self.catalog
    }

    pub fn service_area(&self) -> &ServiceAreaConfig {
        &self.area
    }

    pub fn is_within_service_area(&self, point: Coordinate) -> bool {
        self.area.bounds.contains(point)
    }

    /// 座標とクエリから最寄り地点を検索
    pub fn find_nearby(&self, request: &NearbyQuery) -> Result<NearbyOutcome, LocatorError> {
        let user = request.location;
        validate_coordinate(user)?;

        if !self.is_within_service_area(user) {
            return Ok(NearbyOutcome::OutOfArea(OutOfAreaResponse {
                error: OUT_OF_AREA_ERROR.to_string(),
                service_area: self.area.bounds,
                user_location: user,
                message: OUT_OF_AREA_MESSAGE.to_string(),
            }));
        }

        let mut candidates: Vec<RankedLocation> = self
            .catalog
            .iter()
            .map(|location| RankedLocation {
                location: location.clone(),
                distance: round_km(haversine_km(user, location.coordinate())),
                relevance_score: None,
            })
            .collect();
        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let filtered = self.scorer.rank(candidates, &request.query);
        let total_found = filtered.len();
        let nearest_locations: Vec<RankedLocation> =
            filtered.into_iter().take(self.top_n).collect();
        let message = describe_results(&nearest_locations, &request.query);

        Ok(NearbyOutcome::Found(NearbyResponse {
            user_location: user,
            nearest_locations,
            total_found,
            query: request.query.clone(),
            message,
            service_area: self.area.bounds,
        }))
    }

    pub fn location_details(&self, id: u32) -> Result<LocationDetails, LocatorError> {
        self.catalog
            .iter()
            .find(|location| location.id == id)
            .map(|location| LocationDetails {
                location: location.clone(),
                detailed_info: detailed_info(location),
            })
            .ok_or(LocatorError::LocationNotFound { id })
    }

    pub fn service_area_info(&self) -> ServiceAreaInfo {
        let mut location_types = Vec::new();
        for location in self.catalog.iter() {
            if !location_types.contains(&location.kind) {
                location_types.push(location.kind);
            }
        }

        ServiceAreaInfo {
            area: self.area.clone(),
            total_locations: self.catalog.len(),
            location_types,
            message: "We serve the downtown area with various shops and services.".to_string(),
        }
    }

    /// サービスエリア内の一様乱数座標（動作確認用）
    pub fn random_point<R: Rng>(&self, rng: &mut R) -> Coordinate {
        let b = self.area.bounds;
        let point = Coordinate::new(
            rng.random_range(b.south..=b.north),
            rng.random_range(b.west..=b.east),
        );
        if self.is_within_service_area(point) {
            point
        } else {
            self.area.center
        }
    }
}

fn validate_coordinate(point: Coordinate) -> Result<(), LocatorError> {
    if !point.lat.is_finite() || !(-90.0..=90.0).contains(&point.lat) {
        return Err(LocatorError::CoordinateOutOfRange {
            field: "lat",
            value: point.lat,
        });
    }
    if !point.lng.is_finite() || !(-180.0..=180.0).contains(&point.lng) {
        return Err(LocatorError::CoordinateOutOfRange {
            field: "lng",
            value: point.lng,
        });
    }
    Ok(())
}
