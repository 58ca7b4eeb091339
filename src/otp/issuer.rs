use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::OtpConfig,
    domain::{Payment, PaymentStatus},
    error::{AppError, Result},
    notify::OtpNotifier,
    otp,
};

/// Creates and (re)issues the passcode bound to a payment. The service
/// persists the mutated payment before delivery is attempted, so a code
/// that was never stored is never sent.
pub struct OtpIssuer {
    notifier: Arc<dyn OtpNotifier>,
    config: OtpConfig,
}

impl OtpIssuer {
    pub fn new(notifier: Arc<dyn OtpNotifier>, config: OtpConfig) -> Self {
        Self { notifier, config }
    }

    /// Stamp a fresh code onto the payment: store the hash only, open a
    /// full TTL window, reset the attempt counter, move to `pending_otp`.
    /// Returns the plaintext code for delivery.
    pub fn issue(&self, payment: &mut Payment, now: DateTime<Utc>) -> String {
        let code = otp::generate_code();
        payment.otp_code_hash = Some(otp::hash_code(&code));
        payment.otp_expires_at = Some(now + Duration::seconds(self.config.ttl_secs));
        payment.otp_attempts = 0;
        payment.status = PaymentStatus::PendingOtp;
        code
    }

    /// Guarded reissue. The old code is invalidated by overwriting its
    /// hash; the attempt counter and TTL reset exactly as on first issue.
    pub fn prepare_resend(&self, payment: &mut Payment, now: DateTime<Utc>) -> Result<String> {
        if !payment.is_awaiting_otp() {
            return Err(AppError::PaymentAlreadyTerminal);
        }
        if payment.resend_count >= payment.resend_max {
            return Err(AppError::ResendLimitExceeded);
        }

        let last_issue = payment.last_resend_at.unwrap_or(payment.created_at);
        let elapsed = (now - last_issue).num_seconds();
        if elapsed < self.config.resend_min_interval_secs {
            return Err(AppError::ResendTooSoon {
                retry_after_secs: self.config.resend_min_interval_secs - elapsed,
            });
        }

        let code = self.issue(payment, now);
        payment.resend_count += 1;
        payment.last_resend_at = Some(now);
        Ok(code)
    }

    /// Dispatch the code over the contact channel. Exactly one outbound
    /// notification per successful issue/resend; none on rejection.
    pub async fn deliver(&self, payment: &Payment, code: &str) -> Result<()> {
        self.notifier
            .send_code(&payment.contact_number, code, &payment.reference_number)
            .await
    }
}
