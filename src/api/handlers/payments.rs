use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{Payment, PaymentStatus},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct CreatePaymentDto {
    contact_number: String,
    plan: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    payment_id: Uuid,
    reference_number: String,
    status: PaymentStatus,
    amount: i64,
    currency: String,
    expires_at: Option<DateTime<Utc>>,
}

impl From<Payment> for CreatePaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: payment.id,
            reference_number: payment.reference_number,
            status: payment.status,
            amount: payment.amount_centavos,
            currency: payment.currency,
            expires_at: payment.otp_expires_at,
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    Json(dto): Json<CreatePaymentDto>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>)> {
    let payment = state
        .service_context
        .payment_service
        .create_payment(&dto.contact_number, &dto.plan)
        .await?;

    Ok((StatusCode::CREATED, Json(payment.into())))
}

#[derive(Debug, Deserialize)]
pub struct VerifyDto {
    code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    status: PaymentStatus,
}

pub async fn verify(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(dto): Json<VerifyDto>,
) -> Result<Json<VerifyResponse>> {
    let payment = state
        .service_context
        .payment_service
        .verify_payment(id, &dto.code)
        .await?;

    Ok(Json(VerifyResponse {
        status: payment.status,
    }))
}

#[derive(Debug, Serialize)]
pub struct ResendResponse {
    expires_at: Option<DateTime<Utc>>,
    resends_remaining: i32,
}

pub async fn resend(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResendResponse>> {
    let payment = state
        .service_context
        .payment_service
        .resend_otp(id)
        .await?;

    Ok(Json(ResendResponse {
        expires_at: payment.otp_expires_at,
        resends_remaining: payment.resends_remaining(),
    }))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VerifyResponse>> {
    let payment = state
        .service_context
        .payment_service
        .cancel_payment(id)
        .await?;

    Ok(Json(VerifyResponse {
        status: payment.status,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: PaymentStatus,
    amount: i64,
    currency: String,
    reference_number: String,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,
}

impl From<Payment> for StatusResponse {
    fn from(payment: Payment) -> Self {
        Self {
            status: payment.status,
            amount: payment.amount_centavos,
            currency: payment.currency,
            reference_number: payment.reference_number,
            created_at: payment.created_at,
            verified_at: payment.verified_at,
            paid_at: payment.paid_at,
            failure_reason: payment.failure_reason,
        }
    }
}

/// Status poll for the client. Side-effect free; safe at any frequency.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>> {
    let payment = state.service_context.payment_service.get_status(id).await?;
    Ok(Json(payment.into()))
}
