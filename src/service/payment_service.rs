use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::{GatewayConfig, OtpConfig},
    domain::{
        generate_reference, FailureReason, Member, MemberStatus, Payment, PaymentStatus,
        PhoneNumber, MAX_REFERENCE_RETRIES,
    },
    error::{AppError, Result},
    gateway::{GatewayStatus, WalletGateway},
    otp::{OtpIssuer, OtpVerifier, VerifyOutcome},
    repository::{MemberRepository, PaymentRepository, PlanRepository},
};

/// How many times a mutating operation is replayed after losing an
/// optimistic-version race before the conflict surfaces to the caller.
const CONFLICT_RETRIES: u32 = 1;

/// Owns the payment lifecycle: request creation, OTP issue/resend/verify,
/// gateway finalization, cancellation, status reads and the expiry sweep.
/// Every mutation goes through the repository's version guard, so each
/// logical event (attempt counted, resend counted, terminal state set)
/// commits exactly once even under concurrent requests.
pub struct PaymentService {
    payment_repo: Arc<dyn PaymentRepository>,
    member_repo: Arc<dyn MemberRepository>,
    plan_repo: Arc<dyn PlanRepository>,
    gateway: Arc<dyn WalletGateway>,
    issuer: OtpIssuer,
    otp_config: OtpConfig,
    gateway_config: GatewayConfig,
}

impl PaymentService {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository>,
        member_repo: Arc<dyn MemberRepository>,
        plan_repo: Arc<dyn PlanRepository>,
        gateway: Arc<dyn WalletGateway>,
        issuer: OtpIssuer,
        otp_config: OtpConfig,
        gateway_config: GatewayConfig,
    ) -> Self {
        Self {
            payment_repo,
            member_repo,
            plan_repo,
            gateway,
            issuer,
            otp_config,
            gateway_config,
        }
    }

    /// Validate the request, create the payment and issue the first code.
    /// The row is inserted in `created` and moves to `pending_otp` once the
    /// code is stored; delivery failure fails the payment closed.
    pub async fn create_payment(&self, contact_raw: &str, plan_slug: &str) -> Result<Payment> {
        let phone = PhoneNumber::parse(contact_raw)?;

        let plan = self
            .plan_repo
            .find_by_slug(plan_slug)
            .await?
            .filter(|p| p.active)
            .ok_or_else(|| AppError::Validation(format!("Unknown plan: {}", plan_slug)))?;

        let member = self.find_or_create_member(&phone).await?;
        let now = Utc::now();

        let mut payment = Payment {
            id: Uuid::new_v4(),
            reference_number: generate_reference(now),
            member_id: member.id,
            plan_id: plan.id,
            amount_centavos: plan.amount_centavos(self.gateway_config.php_per_usd),
            currency: "PHP".to_string(),
            contact_number: phone.as_str().to_string(),
            status: PaymentStatus::Created,
            otp_code_hash: None,
            otp_expires_at: None,
            otp_attempts: 0,
            otp_max_attempts: self.otp_config.max_attempts,
            resend_count: 0,
            resend_max: self.otp_config.resend_max,
            last_resend_at: None,
            provider_ref: None,
            failure_reason: None,
            created_at: now,
            verified_at: None,
            paid_at: None,
            version: 0,
        };

        // Uniqueness is enforced by the DB; regenerate on collision.
        let mut inserted = false;
        for _ in 0..MAX_REFERENCE_RETRIES {
            if self.payment_repo.insert(&payment).await? {
                inserted = true;
                break;
            }
            tracing::warn!("Reference collision on {}, regenerating", payment.reference_number);
            payment.reference_number = generate_reference(now);
        }
        if !inserted {
            return Err(AppError::Internal(
                "Could not allocate a unique reference number".to_string(),
            ));
        }

        let code = self.issuer.issue(&mut payment, now);
        if !self.payment_repo.update_guarded(&payment, 0).await? {
            return Err(AppError::Conflict("Payment was modified during creation".to_string()));
        }
        payment.version += 1;

        if let Err(e) = self.issuer.deliver(&payment, &code).await {
            self.mark_failed(&mut payment, FailureReason::Delivery).await;
            return Err(e);
        }

        tracing::info!(
            "Payment {} created for {} ({} {})",
            payment.reference_number,
            payment.contact_number,
            payment.amount_centavos,
            payment.currency
        );
        Ok(payment)
    }

    /// Check a submitted code and, on success, finalize with the gateway.
    pub async fn verify_payment(&self, id: Uuid, submitted_code: &str) -> Result<Payment> {
        for _ in 0..=CONFLICT_RETRIES {
            let mut payment = self.load(id).await?;
            let expected_version = payment.version;
            let outcome = OtpVerifier::verify(&mut payment, submitted_code, Utc::now());

            if outcome == VerifyOutcome::AlreadyTerminal {
                return Err(AppError::PaymentAlreadyTerminal);
            }

            if !self
                .payment_repo
                .update_guarded(&payment, expected_version)
                .await?
            {
                // Lost the race; reload and replay once.
                continue;
            }
            payment.version += 1;

            return match outcome {
                VerifyOutcome::Verified => {
                    tracing::info!("Payment {} verified", payment.reference_number);
                    self.finalize(payment).await
                }
                VerifyOutcome::Expired => Err(AppError::OtpExpired),
                VerifyOutcome::Mismatch { attempts_remaining } => {
                    Err(AppError::OtpMismatch { attempts_remaining })
                }
                VerifyOutcome::AttemptsExceeded => Err(AppError::OtpAttemptsExceeded),
                VerifyOutcome::AlreadyTerminal => Err(AppError::PaymentAlreadyTerminal),
            };
        }
        Err(AppError::Conflict(
            "Concurrent update on payment; retry the request".to_string(),
        ))
    }

    /// Reissue the code, invalidating the previous one. Rejections leave
    /// the payment untouched and send nothing.
    pub async fn resend_otp(&self, id: Uuid) -> Result<Payment> {
        for _ in 0..=CONFLICT_RETRIES {
            let mut payment = self.load(id).await?;
            let expected_version = payment.version;
            let code = self.issuer.prepare_resend(&mut payment, Utc::now())?;

            if !self
                .payment_repo
                .update_guarded(&payment, expected_version)
                .await?
            {
                continue;
            }
            payment.version += 1;

            if let Err(e) = self.issuer.deliver(&payment, &code).await {
                self.mark_failed(&mut payment, FailureReason::Delivery).await;
                return Err(e);
            }

            tracing::info!(
                "Payment {} code resent ({} of {})",
                payment.reference_number,
                payment.resend_count,
                payment.resend_max
            );
            return Ok(payment);
        }
        Err(AppError::Conflict(
            "Concurrent update on payment; retry the request".to_string(),
        ))
    }

    /// One-way cancellation, allowed only while the OTP window is open.
    /// Racing a verify is fine: whichever commit wins, the loser observes
    /// a terminal payment.
    pub async fn cancel_payment(&self, id: Uuid) -> Result<Payment> {
        for _ in 0..=CONFLICT_RETRIES {
            let mut payment = self.load(id).await?;
            let expected_version = payment.version;

            if !payment.is_awaiting_otp() {
                return Err(AppError::PaymentAlreadyTerminal);
            }

            payment.status = PaymentStatus::Cancelled;
            payment.otp_code_hash = None;
            payment.failure_reason = Some(FailureReason::Cancelled.as_str().to_string());

            if !self
                .payment_repo
                .update_guarded(&payment, expected_version)
                .await?
            {
                continue;
            }
            payment.version += 1;

            tracing::info!("Payment {} cancelled", payment.reference_number);
            return Ok(payment);
        }
        Err(AppError::Conflict(
            "Concurrent update on payment; retry the request".to_string(),
        ))
    }

    /// Read-only status for the polling client. Never blocks on an
    /// in-flight transition; returns whatever state last committed.
    pub async fn get_status(&self, id: Uuid) -> Result<Payment> {
        self.load(id).await
    }

    /// Fail stale `pending_otp` payments past their expiry. Called
    /// periodically so abandoned payments reach a terminal state without
    /// client action.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let swept = self.payment_repo.fail_expired(Utc::now()).await?;
        if swept > 0 {
            tracing::info!("Expiry sweep failed {} stale payment(s)", swept);
        }
        Ok(swept)
    }

    /// Verified → Completed as one atomic unit: confirm settlement with
    /// the provider, then extend the membership and mark paid in a single
    /// transaction. Any failure rolls the payment to Failed; partial
    /// activation is never observable.
    async fn finalize(&self, mut payment: Payment) -> Result<Payment> {
        match self.try_finalize(&mut payment).await {
            Ok(()) => Ok(payment),
            // A version conflict means another writer already took the
            // payment to a terminal state; leave their result alone.
            Err(e @ AppError::Conflict(_)) => Err(e),
            Err(e) => {
                // Either step failing (settlement or activation) rolls the
                // payment to Failed; a partially activated membership is
                // never observable. The recorded reason tracks which step
                // broke so the status poll does not misreport it.
                let reason = match &e {
                    AppError::Gateway(_) => FailureReason::Gateway,
                    _ => FailureReason::Internal,
                };
                self.mark_failed(&mut payment, reason).await;
                Err(e)
            }
        }
    }

    async fn try_finalize(&self, payment: &mut Payment) -> Result<()> {
        let provider_ref = self.settle(payment).await?;

        let member = self
            .member_repo
            .find_by_id(payment.member_id)
            .await?
            .ok_or_else(|| AppError::Internal("Payment references missing member".to_string()))?;
        let plan = self
            .plan_repo
            .find_by_id(payment.plan_id)
            .await?
            .ok_or_else(|| AppError::Internal("Payment references missing plan".to_string()))?;

        let now = Utc::now();
        let new_expiry = member.extended_expiry(now, plan.duration_days);
        let expected_version = payment.version;
        payment.provider_ref = Some(provider_ref);
        payment.paid_at = Some(now);
        payment.status = PaymentStatus::Completed;

        if !self
            .payment_repo
            .complete_with_membership(payment, expected_version, new_expiry)
            .await?
        {
            return Err(AppError::Conflict(
                "Payment changed during finalization".to_string(),
            ));
        }
        payment.version += 1;

        tracing::info!(
            "Payment {} completed; membership for {} extended to {}",
            payment.reference_number,
            payment.member_id,
            new_expiry
        );
        Ok(())
    }

    /// Submit and poll the provider within the bounded retry budget.
    async fn settle(&self, payment: &Payment) -> Result<String> {
        let provider_ref = self.gateway.submit(payment).await?;

        let mut delay = Duration::from_millis(self.gateway_config.backoff_base_ms);
        for attempt in 1..=self.gateway_config.max_attempts {
            match self.gateway.query_status(&provider_ref).await? {
                GatewayStatus::Success => return Ok(provider_ref),
                GatewayStatus::Failure => {
                    return Err(AppError::Gateway("Provider rejected the charge".to_string()))
                }
                GatewayStatus::Pending if attempt < self.gateway_config.max_attempts => {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                GatewayStatus::Pending => {}
            }
        }
        // Fail closed rather than hang on a provider that never settles.
        Err(AppError::Gateway(
            "Provider did not settle within the retry budget".to_string(),
        ))
    }

    async fn mark_failed(&self, payment: &mut Payment, reason: FailureReason) {
        payment.status = PaymentStatus::Failed;
        payment.otp_code_hash = None;
        payment.paid_at = None;
        payment.failure_reason = Some(reason.as_str().to_string());

        let expected_version = payment.version;
        match self
            .payment_repo
            .update_guarded(payment, expected_version)
            .await
        {
            Ok(true) => payment.version += 1,
            Ok(false) => tracing::warn!(
                "Payment {} changed while failing it ({})",
                payment.reference_number,
                reason.as_str()
            ),
            Err(e) => tracing::error!(
                "Could not mark payment {} failed: {}",
                payment.reference_number,
                e
            ),
        }
    }

    async fn load(&self, id: Uuid) -> Result<Payment> {
        self.payment_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
    }

    async fn find_or_create_member(&self, phone: &PhoneNumber) -> Result<Member> {
        if let Some(member) = self.member_repo.find_by_contact(phone.as_str()).await? {
            return Ok(member);
        }

        let now = Utc::now();
        let member = Member {
            id: Uuid::new_v4(),
            full_name: String::new(),
            contact_number: phone.as_str().to_string(),
            status: MemberStatus::Pending,
            membership_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        self.member_repo.create(&member).await?;
        Ok(member)
    }
}
