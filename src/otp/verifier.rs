use chrono::{DateTime, Utc};

use crate::{
    domain::{FailureReason, Payment, PaymentStatus},
    otp,
};

/// Outcome of a verification attempt. Every variant except
/// `AlreadyTerminal` mutates the payment and must be persisted before the
/// result is reported to the caller.
#[derive(Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    Expired,
    Mismatch { attempts_remaining: i32 },
    AttemptsExceeded,
    AlreadyTerminal,
}

/// Validates a submitted code against the issued one, enforcing expiry and
/// the attempt ceiling. Pure state transition; the service runs it under
/// the per-payment version guard and persists the result.
pub struct OtpVerifier;

impl OtpVerifier {
    pub fn verify(payment: &mut Payment, submitted: &str, now: DateTime<Utc>) -> VerifyOutcome {
        if !payment.is_awaiting_otp() {
            return VerifyOutcome::AlreadyTerminal;
        }

        if payment.otp_expired_at(now) {
            payment.status = PaymentStatus::Failed;
            payment.otp_code_hash = None;
            payment.failure_reason = Some(FailureReason::OtpExpired.as_str().to_string());
            return VerifyOutcome::Expired;
        }

        let matched = payment
            .otp_code_hash
            .as_deref()
            .map(|hash| otp::code_matches(submitted, hash))
            .unwrap_or(false);

        if !matched {
            payment.otp_attempts += 1;
            if payment.otp_attempts >= payment.otp_max_attempts {
                payment.status = PaymentStatus::Failed;
                payment.otp_code_hash = None;
                payment.failure_reason =
                    Some(FailureReason::OtpAttemptsExceeded.as_str().to_string());
                return VerifyOutcome::AttemptsExceeded;
            }
            return VerifyOutcome::Mismatch {
                attempts_remaining: payment.attempts_remaining(),
            };
        }

        payment.otp_code_hash = None;
        payment.verified_at = Some(now);
        payment.status = PaymentStatus::Verified;
        VerifyOutcome::Verified
    }
}
