use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use ecomatrix_locator::config::ConfigSet;
use ecomatrix_locator::handlers::AppState;

fn app() -> Router {
    let config = ConfigSet::load_from_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/config"))
        .expect("load default config");
    ecomatrix_locator::create_app(AppState::new(config))
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn nearby_from_center_returns_top_five() {
    let body = json!({ "lat": 40.7128, "lng": -74.0060 }).to_string();
    let (status, json) = send(post_json("/api/find-nearby", &body)).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json["nearest_locations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "Butter Shop A",
            "House Alpha",
            "Hammer Shop B",
            "Coffee Corner C",
            "House Gamma"
        ]
    );
    assert_eq!(json["total_found"], 8);
    assert_eq!(json["query"], "");
    assert_eq!(json["nearest_locations"][0]["type"], "shop");
    assert_eq!(json["nearest_locations"][0]["distance"], 0.158);
    assert!(json["nearest_locations"][0].get("relevance_score").is_none());
    assert!(json["message"]
        .as_str()
        .unwrap()
        .starts_with("Here are some places near you!"));
    assert_eq!(json["service_area"]["north"], 40.7228);
}

#[tokio::test]
async fn coffee_query_puts_coffee_first() {
    let body = json!({ "lat": 40.7128, "lng": -74.0060, "query": "coffee" }).to_string();
    let (status, json) = send(post_json("/api/find-nearby", &body)).await;

    assert_eq!(status, StatusCode::OK);
    let first = &json["nearest_locations"][0];
    assert_eq!(first["name"], "Coffee Corner C");
    assert_eq!(first["relevance_score"], 13);
    assert_eq!(json["nearest_locations"][1]["relevance_score"], 0);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .starts_with("I found several options for coffee near you!"));
}

#[tokio::test]
async fn long_query_drops_unrelated_locations() {
    let body =
        json!({ "lat": 40.7128, "lng": -74.0060, "query": "hardware tools near me" }).to_string();
    let (_, json) = send(post_json("/api/find-nearby", &body)).await;
    assert_eq!(json["total_found"], 1);
    assert_eq!(json["nearest_locations"][0]["name"], "Hammer Shop B");

    let body = json!({ "lat": 40.7128, "lng": -74.0060, "query": "pizza delivery please tonight" })
        .to_string();
    let (status, json) = send(post_json("/api/find-nearby", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_found"], 0);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .starts_with("I didn't find any pizza delivery please tonight"));
}

#[tokio::test]
async fn outside_point_is_a_normal_result() {
    let body = json!({ "lat": 41.0, "lng": -74.0060 }).to_string();
    let (status, json) = send(post_json("/api/find-nearby", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["error"], "Location is outside the service area");
    assert_eq!(json["user_location"]["lat"], 41.0);
    assert_eq!(json["service_area"]["south"], 40.7028);
    assert!(json.get("nearest_locations").is_none());
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    for body in [
        r#"{"lng": -74.0060}"#,
        r#"{"lat": null, "lng": -74.0060}"#,
        r#"{"lat": "north", "lng": -74.0060}"#,
        r#"{"lat": 91.0, "lng": -74.0060}"#,
        r#"{"lat": 40.71,"#,
    ] {
        let (status, json) = send(post_json("/api/find-nearby", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(json["code"], "INVALID_INPUT", "body: {body}");
    }
}

#[tokio::test]
async fn location_details_and_not_found() {
    let (status, json) = send(get("/api/locations/2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Hammer Shop B");
    assert!(json["detailed_info"]
        .as_str()
        .unwrap()
        .contains("hardware"));

    let (status, json) = send(get("/api/locations/99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn catalog_and_service_area() {
    let (status, json) = send(get("/api/locations")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 8);

    let (_, json) = send(get("/api/service-area")).await;
    assert_eq!(json["total_locations"], 8);
    assert_eq!(json["location_types"], json!(["shop", "house"]));
    assert_eq!(json["area"]["center"]["lat"], 40.7128);
}

#[tokio::test]
async fn random_location_is_inside() {
    let (status, json) = send(get("/api/random-location")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_within_bounds"], true);
    let lat = json["lat"].as_f64().unwrap();
    assert!((40.7028..=40.7228).contains(&lat));
}

#[tokio::test]
async fn health_root_and_test_endpoints() {
    let (status, json) = send(get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["active_connections"], 0);

    let (_, json) = send(get("/")).await;
    assert_eq!(json["endpoints"]["websocket"], "/media");
    assert_eq!(json["endpoints"]["test"], "/api/test");
    assert_eq!(json["endpoints"]["random_location"], "/api/random-location");

    let (_, json) = send(get("/api/test")).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["message"], "Server is running");
}

#[tokio::test]
async fn intent_detection_endpoint() {
    let (status, json) = send(post_json(
        "/api/intent",
        r#"{"query": "I want a coffee or a latte nearby"}"#,
    ))
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["detected_intents"][0]["intent"], "find_coffee");
    assert!(!json["suggested_searches"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn passthru_acknowledges() {
    let request = Request::builder()
        .method("POST")
        .uri("/passthru?CallSid=CA1&Stream%5BStreamSID%5D=s-1&Stream%5BStatus%5D=completed")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert_eq!(json["message"], "Passthru processed successfully");
}

#[tokio::test]
async fn passthru_evicts_terminal_session() {
    let config = ConfigSet::load_from_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/config"))
        .expect("load default config");
    let state = AppState::new(config);
    state.sessions.create("s-1").unwrap();
    assert_eq!(state.sessions.active_sessions(), 1);

    let response = ecomatrix_locator::create_app(state.clone())
        .oneshot(get(
            "/passthru?Stream%5BStreamSID%5D=s-1&Stream%5BStatus%5D=completed",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.sessions.active_sessions(), 0);
}
