use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single wallet payment attempt for a membership plan. Rows are never
/// deleted; terminal payments remain as the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub reference_number: String,
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub amount_centavos: i64,
    pub currency: String,
    pub contact_number: String,
    pub status: PaymentStatus,
    pub otp_code_hash: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub otp_attempts: i32,
    pub otp_max_attempts: i32,
    pub resend_count: i32,
    pub resend_max: i32,
    pub last_resend_at: Option<DateTime<Utc>>,
    pub provider_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter; bumped by every guarded write.
    pub version: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    PendingOtp,
    Verified,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Terminal states have no outgoing transitions and hold no live code.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }
}

/// Why a payment ended in `Failed` (or `Cancelled`), surfaced through the
/// status endpoint so a polling client can decide whether to restart.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    OtpExpired,
    OtpAttemptsExceeded,
    Gateway,
    Delivery,
    Cancelled,
    Internal,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::OtpExpired => "otp_expired",
            FailureReason::OtpAttemptsExceeded => "otp_attempts_exceeded",
            FailureReason::Gateway => "gateway",
            FailureReason::Delivery => "delivery",
            FailureReason::Cancelled => "cancelled",
            FailureReason::Internal => "internal",
        }
    }
}

impl Payment {
    /// A resend or verify only makes sense while the OTP window is open.
    pub fn is_awaiting_otp(&self) -> bool {
        self.status == PaymentStatus::PendingOtp
    }

    pub fn otp_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.otp_expires_at.map(|exp| now > exp).unwrap_or(true)
    }

    pub fn attempts_remaining(&self) -> i32 {
        (self.otp_max_attempts - self.otp_attempts).max(0)
    }

    pub fn resends_remaining(&self) -> i32 {
        (self.resend_max - self.resend_count).max(0)
    }
}
