//! 発話テキストからの意図推定（キーワード一致率ベース）
use serde::Serialize;

const INTENT_PATTERNS: &[(&str, &[&str])] = &[
    ("find_coffee", &["coffee", "cafe", "espresso", "latte", "cappuccino"]),
    ("find_hardware", &["hardware", "tools", "hammer", "screwdriver", "repair"]),
    ("find_books", &["book", "library", "reading", "novel", "magazine"]),
    ("find_tech", &["tech", "electronics", "computer", "phone", "gadget"]),
    ("find_food", &["restaurant", "food", "eat", "hungry", "meal"]),
    ("general_search", &["shop", "store", "near", "nearby", "find", "looking"]),
];

const LOCATION_KEYWORDS: &[&str] = &[
    "near", "nearby", "closest", "find", "where", "shop", "store", "coffee", "hardware", "book",
];

/// 提案を付けるための最低信頼度
const SUGGESTION_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedIntent {
    pub intent: &'static str,
    pub confidence: f64,
    pub matched_keywords: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentReport {
    pub query: String,
    pub detected_intents: Vec<DetectedIntent>,
    pub suggested_searches: Vec<&'static str>,
    pub confidence: f64,
}

pub fn detect_intent(query: &str) -> IntentReport {
    let lowered = query.to_lowercase();

    let mut detected_intents: Vec<DetectedIntent> = INTENT_PATTERNS
        .iter()
        .filter_map(|&(intent, keywords)| {
            let matched: Vec<&'static str> = keywords
                .iter()
                .copied()
                .filter(|kw| lowered.contains(kw))
                .collect();
            if matched.is_empty() {
                return None;
            }
            Some(DetectedIntent {
                intent,
                confidence: (matched.len() as f64 / keywords.len() as f64).min(1.0),
                matched_keywords: matched,
            })
        })
        .collect();

    detected_intents.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let confidence = detected_intents.first().map_or(0.0, |top| top.confidence);
    let suggested_searches = match detected_intents.first() {
        Some(top) if confidence > SUGGESTION_THRESHOLD => suggestions_for(top.intent),
        _ => Vec::new(),
    };

    IntentReport {
        query: query.to_string(),
        detected_intents,
        suggested_searches,
        confidence,
    }
}

fn suggestions_for(intent: &str) -> Vec<&'static str> {
    if intent.contains("coffee") {
        vec!["coffee shops", "cafes", "places for drinks"]
    } else if intent.contains("hardware") {
        vec!["hardware stores", "tool shops", "repair services"]
    } else if intent.contains("books") {
        vec!["bookstores", "libraries", "reading places"]
    } else if intent.contains("tech") {
        vec!["electronics stores", "computer shops", "tech services"]
    } else {
        vec!["nearby shops", "local businesses", "services"]
    }
}

/// 場所探しの発話かどうか（エージェントが検索を呼ぶか判断する）
pub fn is_location_query(text: &str) -> bool {
    let lowered = text.to_lowercase();
    LOCATION_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}
