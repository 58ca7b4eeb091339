use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt;

use gympay::{
    api,
    config::Settings,
    error::Result,
    gateway::{GatewayStatus, WalletGateway},
    notify::OtpNotifier,
    service::ServiceContext,
};

struct RecordingNotifier {
    codes: Mutex<Vec<String>>,
}

#[async_trait]
impl OtpNotifier for RecordingNotifier {
    async fn send_code(&self, _contact: &str, code: &str, _reference: &str) -> Result<()> {
        self.codes.lock().unwrap().push(code.to_string());
        Ok(())
    }
}

struct AlwaysSettlesGateway;

#[async_trait]
impl WalletGateway for AlwaysSettlesGateway {
    async fn submit(&self, payment: &gympay::domain::Payment) -> Result<String> {
        Ok(format!("prov-{}", payment.reference_number))
    }

    async fn query_status(&self, _provider_ref: &str) -> Result<GatewayStatus> {
        Ok(GatewayStatus::Success)
    }
}

async fn test_app() -> anyhow::Result<(Router, Arc<RecordingNotifier>)> {
    let pool = SqlitePool::connect(":memory:").await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let settings = Settings::default();
    let notifier = Arc::new(RecordingNotifier {
        codes: Mutex::new(Vec::new()),
    });
    let ctx = Arc::new(ServiceContext::new(
        pool,
        Arc::new(AlwaysSettlesGateway),
        notifier.clone(),
        &settings,
    ));
    Ok((api::create_app(ctx, Arc::new(settings)), notifier))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> anyhow::Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn health_endpoint() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let response = app.oneshot(get("/health")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn plans_endpoint_lists_converted_pricing() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let response = app.oneshot(get("/api/plans")).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    let plans = body.as_array().unwrap();
    assert_eq!(plans.len(), 3);
    assert_eq!(plans[0]["slug"], "monthly");
    assert_eq!(plans[0]["amount_centavos"], 168_000);
    assert_eq!(plans[0]["currency"], "PHP");
    Ok(())
}

#[tokio::test]
async fn create_rejects_invalid_contact_number() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let response = app
        .oneshot(post_json(
            "/api/payments",
            json!({"contact_number": "12345", "plan": "monthly"}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await?;
    assert_eq!(body["error"], "ValidationError");
    Ok(())
}

#[tokio::test]
async fn full_flow_over_http() -> anyhow::Result<()> {
    let (app, notifier) = test_app().await?;

    // Create
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/payments",
            json!({"contact_number": "09171234567", "plan": "monthly"}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "pending_otp");
    assert_eq!(body["amount"], 168_000);
    assert!(body["reference_number"].as_str().unwrap().starts_with("GYM-"));
    assert!(body["expires_at"].is_string());
    let payment_id = body["payment_id"].as_str().unwrap().to_string();

    // Wrong code counts down attempts
    let real_code = notifier.codes.lock().unwrap().last().unwrap().clone();
    let wrong = if real_code == "000000" { "111111" } else { "000000" };
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/payments/{}/verify", payment_id),
            json!({"code": wrong}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await?;
    assert_eq!(body["error"], "OtpMismatch");
    assert_eq!(body["attempts_remaining"], 4);

    // Resend straight away trips the throttle
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/payments/{}/resend", payment_id),
            json!({}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await?;
    assert_eq!(body["error"], "ResendTooSoon");
    assert!(body["retry_after_secs"].as_i64().unwrap() > 0);

    // Correct code completes
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/payments/{}/verify", payment_id),
            json!({"code": real_code}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "completed");

    // Status poll reflects the terminal state
    let response = app
        .clone()
        .oneshot(get(&format!("/api/payments/{}", payment_id)))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "completed");
    assert!(body["paid_at"].is_string());

    // A verify on the finished payment is a conflict
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/payments/{}/verify", payment_id),
            json!({"code": real_code}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await?;
    assert_eq!(body["error"], "PaymentAlreadyTerminal");

    Ok(())
}

#[tokio::test]
async fn unknown_payment_is_404() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let response = app
        .oneshot(get(&format!("/api/payments/{}", uuid::Uuid::new_v4())))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
