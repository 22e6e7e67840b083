use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use paygate_core::metrics::ProviderHealthRegistry;
use paygate_core::providers::sipay::{SipayConfig, SipayProvider};
use paygate_core::providers::{ExampleBankProvider, PaymentProvider};
use paygate_core::routing::{ProviderRule, RoutingConfig, RoutingEngine};
use paygate_core::services::TokenizationService;
use paygate_core::store::TransactionStore;
use paygate_core::{build_dispatcher, create_app, AppState};

const API_KEY: &str = "test-api-key";

fn test_app() -> Router {
    let mut providers: HashMap<String, Arc<dyn PaymentProvider>> = HashMap::new();
    providers.insert("ExampleBank".to_string(), Arc::new(ExampleBankProvider));

    let routing = Arc::new(RoutingEngine::new(
        RoutingConfig {
            provider_rules: vec![ProviderRule {
                provider: "ExampleBank".to_string(),
                commission_rate: BigDecimal::from_str("0.02").unwrap(),
                bank_bins: vec!["450803".to_string()],
                merchant_ids: vec![],
                priority: 1,
            }],
        },
        providers,
    ));
    let health = Arc::new(ProviderHealthRegistry::new(["ExampleBank"]));
    let store = Arc::new(TransactionStore::new());
    let dispatcher = Arc::new(build_dispatcher(store.clone(), routing, health.clone()));

    create_app(AppState {
        dispatcher,
        store,
        health,
        tokens: Arc::new(TokenizationService::new()),
        sipay: Arc::new(
            SipayProvider::new(SipayConfig {
                base_url: "https://sipay.invalid".to_string(),
                app_id: String::new(),
                app_secret: String::new(),
                merchant_key: String::new(),
                merchant_id: String::new(),
            })
            .expect("client builds"),
        ),
        api_key: API_KEY.to_string(),
        webhook_secret: "app-secret-1".to_string(),
    })
}

fn payment_body(idempotency_key: &str, bank_bin: &str) -> Value {
    json!({
        "idempotency_key": idempotency_key,
        "merchant_id": "M1",
        "amount": "100.00",
        "currency": "TRY",
        "bank_bin": bank_bin,
        "card_token": "tok-1"
    })
}

fn payment_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/payments")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn payment_without_api_key_is_unauthorized() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payment_body("idem-1", "450803").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn blank_idempotency_key_is_rejected() {
    let app = test_app();

    let response = app
        .oneshot(payment_request(&payment_body("   ", "450803")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("idempotency_key"));
}

#[tokio::test]
async fn invalid_fields_fail_validation() {
    let app = test_app();

    let mut body = payment_body("idem-2", "450803");
    body["amount"] = json!("-5");
    body["currency"] = json!("try");

    let response = app.oneshot(payment_request(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    let message = body["error"].as_str().unwrap().to_string();
    assert!(message.contains("amount"));
    assert!(message.contains("currency"));
}

#[tokio::test]
async fn routable_payment_is_approved() {
    let app = test_app();

    let response = app
        .oneshot(payment_request(&payment_body("idem-3", "450803")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["approved"], json!(true));
    assert_eq!(body["transaction"]["status"], json!("Approved"));
    assert_eq!(body["transaction"]["idempotency_key"], json!("idem-3"));
}

#[tokio::test]
async fn unroutable_payment_is_declined_not_erroring() {
    let app = test_app();

    let response = app
        .oneshot(payment_request(&payment_body("idem-4", "999999")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["approved"], json!(false));
    assert_eq!(body["transaction"]["status"], json!("Declined"));
}

#[tokio::test]
async fn duplicate_submission_returns_the_same_transaction() {
    let app = test_app();

    let first = app
        .clone()
        .oneshot(payment_request(&payment_body("idem-5", "450803")))
        .await
        .unwrap();
    let second = app
        .oneshot(payment_request(&payment_body("idem-5", "450803")))
        .await
        .unwrap();

    let first = json_body(first).await;
    let second = json_body(second).await;
    assert_eq!(first["transaction"]["id"], second["transaction"]["id"]);
    assert_eq!(second["approved"], json!(true));
}

#[tokio::test]
async fn transaction_lookup_round_trip() {
    let app = test_app();

    app.clone()
        .oneshot(payment_request(&payment_body("idem-6", "450803")))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/transactions/idem-6")
                .header("x-api-key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], json!("Approved"));

    let missing = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/transactions/idem-unknown")
                .header("x-api-key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn provider_health_reflects_processed_payments() {
    let app = test_app();

    app.clone()
        .oneshot(payment_request(&payment_body("idem-7", "450803")))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/providers/health")
                .header("x-api-key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let entries = body.as_array().unwrap();
    let bank = entries
        .iter()
        .find(|entry| entry["provider"] == json!("ExampleBank"))
        .unwrap();
    assert_eq!(bank["transaction_count"], json!(1));
    assert_eq!(bank["success_count"], json!(1));
}

#[tokio::test]
async fn tokenize_then_pay_with_issued_token() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tokens")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-api-key", API_KEY)
                .body(Body::from(
                    json!({ "card_number": "4508034508034509" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let token_body = json_body(response).await;
    assert_eq!(token_body["masked_card"], json!("************4509"));

    let mut body = payment_body("idem-8", "450803");
    body["card_token"] = token_body["token"].clone();
    let response = app.oneshot(payment_request(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_endpoint_is_open() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
