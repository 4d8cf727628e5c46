use charity_pricing::config::Config;
use charity_pricing::{app, AppState};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

/// Serves a demo-seeded in-memory engine on an ephemeral port.
async fn spawn_server() -> String {
    let mut config = Config::default();
    config.features.seed_demo_data = true;
    config.features.infer_run_state = false;
    config.simulation.seed = Some(7);

    let state = AppState::new(config).await.unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn decimal(v: &Value) -> Decimal {
    match v {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

fn seat(seat_id: &str) -> Value {
    json!({
        "seat_id": seat_id,
        "venue_layout": "arena",
        "section": "floor",
        "row": 1,
        "number": 2,
        "ticket_type_id": "premium"
    })
}

#[tokio::test]
async fn price_and_quote() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{base}/price?face_value=100&uplift=25"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(decimal(&body["charity_amount"]), Decimal::from(25));
    assert_eq!(decimal(&body["platform_fee"]), Decimal::from_str("4.815").unwrap());
    assert_eq!(decimal(&body["total_price"]), Decimal::from_str("129.815").unwrap());

    let res = client
        .get(format!("{base}/price?face_value=-1&uplift=25"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "invalid_input");

    let quote: Value = client
        .get(format!("{base}/artists/1/quote"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quote["artist_slug"], "northern-lights");
    assert_eq!(decimal(&quote["breakdown"]["total_price"]), Decimal::from_str("129.815").unwrap());

    let missing = client.get(format!("{base}/artists/404/quote")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn manual_purchase_flow() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/artists/northern-lights/purchases"))
        .json(&json!({ "seats": [seat("floor-1-2"), seat("floor-1-3")] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(receipt["seats"].as_array().unwrap().len(), 2);
    assert_eq!(receipt["inventory"]["sold_tickets"], 2);

    let again = client
        .post(format!("{base}/artists/northern-lights/purchases"))
        .json(&json!({ "seats": [seat("floor-1-2")] }))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
    let err: Value = again.json().await.unwrap();
    assert_eq!(err["error"], "seat_unavailable");

    let empty = client
        .post(format!("{base}/artists/northern-lights/purchases"))
        .json(&json!({ "seats": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let status: Value = client
        .get(format!("{base}/artists/northern-lights/seats/floor-1-3"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["purchased"], true);

    let seats: Value = client
        .get(format!("{base}/artists/northern-lights/seats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seats.as_array().unwrap().len(), 2);

    let total: Value = client
        .get(format!("{base}/purchases/total"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(total["total"], 2);

    let reset: Value = client
        .post(format!("{base}/simulation/reset"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reset["records_deleted"], 2);

    let total: Value = client
        .get(format!("{base}/purchases/total"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(total["total"], 0);
}

#[tokio::test]
async fn uplift_override_and_batch_simulation() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let too_high = client
        .put(format!("{base}/artists/2/uplift"))
        .json(&json!({ "uplift": "175" }))
        .send()
        .await
        .unwrap();
    assert_eq!(too_high.status(), StatusCode::BAD_REQUEST);

    let updated: Value = client
        .put(format!("{base}/artists/2/uplift"))
        .json(&json!({ "uplift": "40" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(decimal(&updated["current_uplift"]), Decimal::from(40));

    let bad_batch = client
        .post(format!("{base}/artists/2/simulate"))
        .json(&json!({ "duration_minutes": 0.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_batch.status(), StatusCode::BAD_REQUEST);

    let outcome: Value = client
        .post(format!("{base}/artists/2/simulate"))
        .json(&json!({ "duration_minutes": 20.0 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let sold = outcome["sold"].as_u64().unwrap();
    assert!(sold <= outcome["planned"].as_u64().unwrap());
    assert_eq!(outcome["suggestion"]["tickets_sold"].as_u64().unwrap(), sold);

    let log: Value = client
        .get(format!("{base}/artists/2/suggestions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(log.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn simulation_lifecycle_over_http() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let idle: Value = client
        .get(format!("{base}/simulation/state"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(idle["is_running"], false);

    let invalid = client
        .post(format!("{base}/simulation/start"))
        .json(&json!({ "tickets_per_minute": -5.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let started: Value = client
        .post(format!("{base}/simulation/start"))
        .json(&json!({ "tickets_per_minute": 30.0 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(started["is_running"], true);
    assert_eq!(started["source"], "explicit");

    let stopped: Value = client
        .post(format!("{base}/simulation/stop"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stopped["is_running"], false);

    let state: Value = client
        .get(format!("{base}/simulation/state"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["is_running"], false);
}
