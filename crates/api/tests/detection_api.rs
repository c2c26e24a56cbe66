//! Integration tests for the `/api/v1/detections` endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, delete, get, post_json};
use serde_json::{json, Value};
use sqlx::SqlitePool;

async fn record(pool: &SqlitePool, g_id: &str, object_type: &str, timestamp: &str) -> Value {
    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/detections",
        json!({
            "g_id": g_id,
            "object_type": object_type,
            "color": "red",
            "timestamp": timestamp,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED, "recording {g_id}");
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Test: POST records an event and returns it
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn record_returns_created_event(pool: SqlitePool) {
    let json = record(
        &pool,
        "RED_MICROCHIP_CARD_1709632800000",
        "Microchip card",
        "2024-03-05T10:00:00Z",
    )
    .await;

    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["g_id"], "RED_MICROCHIP_CARD_1709632800000");
    assert_eq!(json["data"]["object_type"], "Microchip card");
    assert_eq!(json["data"]["color"], "red");
    assert_eq!(json["data"]["ref_count"], 1);
    assert!(json["data"]["id"].as_i64().unwrap() > 0);
}

// ---------------------------------------------------------------------------
// Test: POST without timestamp uses the server clock
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn record_without_timestamp_is_stamped_now(pool: SqlitePool) {
    let before = chrono::Utc::now() - chrono::Duration::seconds(1);

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/detections",
        json!({ "g_id": "BLUE_STM32_BOARD_1", "object_type": "STM32 board", "color": "blue" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let stamped: chrono::DateTime<chrono::Utc> =
        json["data"]["datetime"].as_str().unwrap().parse().unwrap();
    assert!(stamped >= before);
}

// ---------------------------------------------------------------------------
// Test: A duplicate g_id is a 409 with the DUPLICATE_IDENTITY code
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_identity_returns_409(pool: SqlitePool) {
    record(&pool, "RED_X_1", "Microchip card", "2024-03-05T10:00:00Z").await;

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/detections",
        json!({
            "g_id": "RED_X_1",
            "object_type": "Microchip card",
            "color": "red",
            "timestamp": "2024-03-05T11:00:00Z",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "DUPLICATE_IDENTITY");

    // Only the first event exists.
    let json = body_json(get(build_test_app(pool), "/api/v1/detections").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: Empty and blank fields are rejected
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn empty_fields_are_rejected(pool: SqlitePool) {
    for body in [
        json!({ "g_id": "", "object_type": "Custom card", "color": "green" }),
        json!({ "g_id": "GREEN_1", "object_type": "   ", "color": "green" }),
        json!({ "g_id": "GREEN_1", "object_type": "Custom card", "color": "x".repeat(33) }),
    ] {
        let response = post_json(build_test_app(pool.clone()), "/api/v1/detections", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    let json = body_json(get(build_test_app(pool), "/api/v1/detections").await).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: A body missing required fields is rejected by the extractor
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_fields_are_unprocessable(pool: SqlitePool) {
    let response = post_json(
        build_test_app(pool),
        "/api/v1/detections",
        json!({ "g_id": "RED_1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// Test: GET /detections filters by type and inclusive day range
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_filters_by_type_and_day(pool: SqlitePool) {
    record(&pool, "RED_A", "Microchip card", "2024-03-04T09:00:00Z").await;
    record(&pool, "RED_B", "Microchip card", "2024-03-05T09:00:00Z").await;
    record(&pool, "BLUE_A", "STM32 board", "2024-03-05T10:00:00Z").await;
    record(&pool, "RED_C", "Microchip card", "2024-03-06T09:00:00Z").await;

    let json = body_json(
        get(
            build_test_app(pool.clone()),
            "/api/v1/detections?type=Microchip%20card&from=2024-03-05&to=2024-03-06",
        )
        .await,
    )
    .await;

    let ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["g_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["RED_C", "RED_B"]);
}

// ---------------------------------------------------------------------------
// Test: GET /detections rejects an inverted day range
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_rejects_inverted_range(pool: SqlitePool) {
    let response = get(
        build_test_app(pool),
        "/api/v1/detections?from=2024-03-06&to=2024-03-05",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// Test: GET /detections/recent honours the limit, newest first
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn recent_returns_newest_first(pool: SqlitePool) {
    record(&pool, "RED_1", "Microchip card", "2024-03-05T09:00:00Z").await;
    record(&pool, "RED_2", "Microchip card", "2024-03-05T10:00:00Z").await;
    record(&pool, "RED_3", "Microchip card", "2024-03-05T11:00:00Z").await;

    let json = body_json(get(build_test_app(pool), "/api/v1/detections/recent?limit=2").await).await;

    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["g_id"], "RED_3");
    assert_eq!(data[1]["g_id"], "RED_2");
}

// ---------------------------------------------------------------------------
// Test: GET /detections/{g_id} returns history or 404
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn history_returns_events_for_identity(pool: SqlitePool) {
    record(&pool, "GREEN_CUSTOM_CARD_1", "Custom card", "2024-03-05T09:00:00Z").await;

    let response = get(
        build_test_app(pool.clone()),
        "/api/v1/detections/GREEN_CUSTOM_CARD_1",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let response = get(build_test_app(pool), "/api/v1/detections/UNKNOWN").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Test: DELETE /detections prunes strictly older events and keeps rollups consistent
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn prune_deletes_older_events(pool: SqlitePool) {
    record(&pool, "RED_OLD", "Microchip card", "2024-03-01T09:00:00Z").await;
    record(&pool, "RED_EDGE", "Microchip card", "2024-03-05T00:00:00Z").await;
    record(&pool, "RED_NEW", "Microchip card", "2024-03-06T09:00:00Z").await;

    let response = delete(
        build_test_app(pool.clone()),
        "/api/v1/detections?before=2024-03-05T00:00:00Z",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["deleted"], 1);

    let json = body_json(get(build_test_app(pool.clone()), "/api/v1/detections").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let json = body_json(get(build_test_app(pool), "/api/v1/stats/consistency").await).await;
    assert_eq!(json["data"]["consistent"], true);
}

// ---------------------------------------------------------------------------
// Test: DELETE without a cutoff is rejected
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn prune_requires_cutoff(pool: SqlitePool) {
    let response = delete(build_test_app(pool), "/api/v1/detections").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
