//! Integration tests for the game API endpoints.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt`
//! without starting a TCP server, so handler logic, routing, and status
//! mapping are validated without a live network.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use apiary_economy::{balances, EconomyConfig};
use apiary_ledger::LedgerService;
use apiary_server::{build_router, AppState};
use apiary_types::{Currency, PlayerId, RequestToken};

fn make_state() -> Arc<AppState> {
    let service = LedgerService::with_rng(EconomyConfig::default(), SmallRng::seed_from_u64(11));
    Arc::new(AppState::new(service))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register_player(state: &Arc<AppState>) -> PlayerId {
    let player = PlayerId::new();
    let response = build_router(Arc::clone(state))
        .oneshot(post(&format!("/api/players/{player}"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    player
}

async fn credit(state: &Arc<AppState>, player: PlayerId, currency: Currency, amount: Decimal) {
    state
        .service
        .store()
        .update(player, |rec| {
            balances::credit(&mut rec.ledger, currency, amount)?;
            Ok(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn register_returns_fresh_snapshot() {
    let state = make_state();
    let player = PlayerId::new();

    let response = build_router(Arc::clone(&state))
        .oneshot(post(&format!("/api/players/{player}"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["ledger"]["honey"], json!("0"));
    assert_eq!(body["ledger"]["unlocked_tiers"], json!([1]));
}

#[tokio::test]
async fn sync_unknown_player_is_not_found() {
    let state = make_state();
    let response = build_router(state)
        .oneshot(get(&format!("/api/players/{}", PlayerId::new())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_lists_the_economy() {
    let state = make_state();
    let response = build_router(state)
        .oneshot(get("/api/catalog"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["colonies"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["tiers"].as_array().map(Vec::len), Some(3));
    assert!(!body["prizes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn exchange_scenario_and_validation() {
    let state = make_state();
    let player = register_player(&state).await;
    credit(&state, player, Currency::Diamonds, Decimal::new(500, 0)).await;
    credit(&state, player, Currency::Bvr, Decimal::new(50, 0)).await;

    // 100 diamonds at 10% bonus -> 110 flowers.
    let response = build_router(Arc::clone(&state))
        .oneshot(post(
            &format!("/api/players/{player}/exchange"),
            json!({
                "token": RequestToken::new(),
                "kind": "DiamondsToFlowers",
                "amount": "100",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["ledger"]["diamonds"], json!("400"));
    assert_eq!(body["ledger"]["flowers"], json!("110"));

    // 50 BVR under the minimum of 100 -> 400 with the rule message.
    let response = build_router(Arc::clone(&state))
        .oneshot(post(
            &format!("/api/players/{player}/exchange"),
            json!({
                "token": RequestToken::new(),
                "kind": "BvrToFlowers",
                "amount": "50",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Balances unchanged by the rejected exchange.
    let response = build_router(state)
        .oneshot(get(&format!("/api/players/{player}")))
        .await
        .unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["ledger"]["bvr"], json!("50"));
}

#[tokio::test]
async fn replayed_token_conflicts() {
    let state = make_state();
    let player = register_player(&state).await;
    credit(&state, player, Currency::Diamonds, Decimal::new(500, 0)).await;

    let token = RequestToken::new();
    let body = json!({
        "token": token,
        "kind": "DiamondsToFlowers",
        "amount": "100",
    });

    let response = build_router(Arc::clone(&state))
        .oneshot(post(&format!("/api/players/{player}/exchange"), body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(state)
        .oneshot(post(&format!("/api/players/{player}/exchange"), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn withdrawal_lifecycle_round_trip() {
    let state = make_state();
    let player = register_player(&state).await;
    credit(&state, player, Currency::Diamonds, Decimal::new(25_000, 0)).await;

    // Create: 20000 diamonds escrowed immediately.
    let response = build_router(Arc::clone(&state))
        .oneshot(post(
            &format!("/api/players/{player}/withdrawals"),
            json!({
                "token": RequestToken::new(),
                "currency": "Diamonds",
                "amount": "20000",
                "address": "0xbee5",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tx = body_to_json(response.into_body()).await;
    assert_eq!(tx["status"], json!("Pending"));
    let tx_id = tx["id"].as_str().unwrap().to_owned();

    let response = build_router(Arc::clone(&state))
        .oneshot(get(&format!("/api/players/{player}")))
        .await
        .unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["ledger"]["diamonds"], json!("5000"));

    // The admin queue sees it.
    let response = build_router(Arc::clone(&state))
        .oneshot(get("/api/admin/transactions"))
        .await
        .unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    // Reject: the escrow comes back in the same currency.
    let response = build_router(Arc::clone(&state))
        .oneshot(post(
            &format!("/api/admin/transactions/{tx_id}/reject"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(Arc::clone(&state))
        .oneshot(get(&format!("/api/players/{player}")))
        .await
        .unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["ledger"]["diamonds"], json!("25000"));

    // Terminal transactions cannot transition again.
    let response = build_router(state)
        .oneshot(post(
            &format!("/api/admin/transactions/{tx_id}/approve"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn mission_claims_conflict_on_repeat() {
    let state = make_state();
    let player = register_player(&state).await;

    let body = |token: RequestToken| {
        json!({
            "token": token,
            "mission": 1,
        })
    };

    let response = build_router(Arc::clone(&state))
        .oneshot(post(
            &format!("/api/players/{player}/missions"),
            body(RequestToken::new()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(state)
        .oneshot(post(
            &format!("/api/players/{player}/missions"),
            body(RequestToken::new()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn selling_honey_feeds_the_leaderboard() {
    let state = make_state();
    let player = register_player(&state).await;
    credit(&state, player, Currency::Honey, Decimal::new(500, 0)).await;

    let response = build_router(Arc::clone(&state))
        .oneshot(post(
            &format!("/api/players/{player}/sell"),
            json!({
                "token": RequestToken::new(),
                "amount": "500",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let year = chrono::Utc::now().format("%Y").to_string();
    let response = build_router(Arc::clone(&state))
        .oneshot(get(&format!("/api/leaderboard/{year}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body[0]["score"], json!("500"));

    let response = build_router(state)
        .oneshot(get(&format!("/api/leaderboard/{year}/players/{player}")))
        .await
        .unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["rank"], json!(1));
}

#[tokio::test]
async fn spin_requires_a_ticket() {
    let state = make_state();
    let player = register_player(&state).await;

    // No tickets: 400 with the insufficient-balance message.
    let response = build_router(Arc::clone(&state))
        .oneshot(post(
            &format!("/api/players/{player}/spin"),
            json!({ "token": RequestToken::new() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // With a ticket the draw resolves and the ticket is consumed.
    state
        .service
        .store()
        .update(player, |rec| {
            rec.ledger.tickets = 1;
            Ok(())
        })
        .await
        .unwrap();

    let response = build_router(state)
        .oneshot(post(
            &format!("/api/players/{player}/spin"),
            json!({ "token": RequestToken::new() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["snapshot"]["ledger"]["tickets"], json!(0));
    assert!(body["prize"]["id"].is_number());
}
