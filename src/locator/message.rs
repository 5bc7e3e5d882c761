//! 検索結果・地点詳細の定型文生成（音声応答でそのまま読み上げる想定）
use super::poi::{PoiKind, PointOfInterest, RankedLocation};

pub const OUT_OF_AREA_ERROR: &str = "Location is outside the service area";
pub const OUT_OF_AREA_MESSAGE: &str =
    "I'm sorry, but you're outside our service area. We currently serve the downtown area.";

/// 検索結果を説明する文を組み立てる
pub fn describe_results(locations: &[RankedLocation], query: &str) -> String {
    let query = query.trim();

    match locations {
        [] if query.is_empty() => "I don't see any places in your immediate area right now. \
             Could you try a different location or tell me what you're looking for?"
            .to_string(),
        [] => format!(
            "I didn't find any {query} in your immediate area. \
             Would you like me to help you find something else?"
        ),
        [only] => {
            let unit = if only.distance < 1.0 { "kilometers" } else { "km" };
            format!(
                "I found {} about {:.1} {} from you. {} Would you like directions or more information?",
                only.location.name, only.distance, unit, only.location.description
            )
        }
        _ => {
            let mut parts = Vec::with_capacity(6);
            if query.is_empty() {
                parts.push("Here are some places near you!".to_string());
            } else {
                parts.push(format!("I found several options for {query} near you!"));
            }

            for (i, loc) in locations.iter().take(3).enumerate() {
                let name = &loc.location.name;
                let distance = spoken_distance(loc.distance);
                parts.push(match i {
                    0 => format!("The closest is {name}, just {distance} away."),
                    1 => format!("There's also {name} at {distance}."),
                    _ => format!("And {name} is {distance} from you."),
                });
            }

            if locations.len() > 3 {
                parts.push(format!("I found {} more options as well.", locations.len() - 3));
            }
            parts.push(
                "Which one sounds interesting, or would you like more details about any of them?"
                    .to_string(),
            );
            parts.join(" ")
        }
    }
}

/// 1km 未満はメートル（切り捨て）、それ以上は km 表記
fn spoken_distance(distance_km: f64) -> String {
    if distance_km >= 1.0 {
        format!("{distance_km:.1} km")
    } else {
        format!("{} meters", (distance_km * 1000.0) as u32)
    }
}

/// 地点種別・名前から詳細説明文を生成
pub fn detailed_info(location: &PointOfInterest) -> String {
    let name = location.name.to_lowercase();
    let kind_line = match location.kind {
        PoiKind::Shop if name.contains("coffee") => {
            "They serve freshly brewed coffee and have a cozy atmosphere."
        }
        PoiKind::Shop if name.contains("hardware") || name.contains("hammer") => {
            "You can find tools, equipment, and hardware supplies there."
        }
        PoiKind::Shop if name.contains("book") => {
            "They have a wide selection of books and reading materials."
        }
        PoiKind::Shop if name.contains("tech") => {
            "They specialize in electronics and the latest gadgets."
        }
        PoiKind::Shop => "It's a local shop with friendly service.",
        PoiKind::House => "This is a residential property in the area.",
    };

    [
        location.description.as_str(),
        kind_line,
        "It's located in our downtown service area with easy access.",
    ]
    .iter()
    .filter(|part| !part.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" ")
}
