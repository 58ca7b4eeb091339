use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use gympay::{
    config::Settings,
    domain::{Payment, PaymentStatus},
    error::{AppError, Result},
    gateway::{GatewayStatus, WalletGateway},
    notify::OtpNotifier,
    otp::OtpIssuer,
    repository::{
        PaymentRepository, SqliteMemberRepository, SqlitePaymentRepository, SqlitePlanRepository,
    },
    service::PaymentService,
};

/// Repository wrapper that loses version races on purpose: before
/// delegating a guarded write it mutates the row out-of-band, exactly the
/// way a second request committing first would.
struct ContendedPaymentRepo {
    inner: SqlitePaymentRepository,
    pool: SqlitePool,
    /// Bump the row version this many times, one per `update_guarded`.
    bump_before_update: AtomicUsize,
    /// Once: a rival request completes the payment before our write lands.
    rival_completes: AtomicBool,
    /// Bump the row version before `complete_with_membership`, once each.
    bump_before_complete: AtomicUsize,
}

impl ContendedPaymentRepo {
    fn new(pool: SqlitePool) -> Self {
        Self {
            inner: SqlitePaymentRepository::new(pool.clone()),
            pool,
            bump_before_update: AtomicUsize::new(0),
            rival_completes: AtomicBool::new(false),
            bump_before_complete: AtomicUsize::new(0),
        }
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn bump_version(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE payments SET version = version + 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete_as_rival(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE payments SET status = 'Completed', otp_code_hash = NULL, paid_at = ?, version = version + 1 WHERE id = ?",
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for ContendedPaymentRepo {
    async fn insert(&self, payment: &Payment) -> Result<bool> {
        self.inner.insert(payment).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>> {
        self.inner.find_by_reference(reference).await
    }

    async fn update_guarded(&self, payment: &Payment, expected_version: i64) -> Result<bool> {
        if self.rival_completes.swap(false, Ordering::SeqCst) {
            self.complete_as_rival(payment.id).await?;
        } else if Self::take(&self.bump_before_update) {
            self.bump_version(payment.id).await?;
        }
        self.inner.update_guarded(payment, expected_version).await
    }

    async fn complete_with_membership(
        &self,
        payment: &Payment,
        expected_version: i64,
        new_membership_expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        if Self::take(&self.bump_before_complete) {
            self.bump_version(payment.id).await?;
        }
        self.inner
            .complete_with_membership(payment, expected_version, new_membership_expires_at)
            .await
    }

    async fn fail_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        self.inner.fail_expired(now).await
    }
}

struct CapturingNotifier {
    last_code: Mutex<Option<String>>,
}

#[async_trait]
impl OtpNotifier for CapturingNotifier {
    async fn send_code(&self, _contact: &str, code: &str, _reference: &str) -> Result<()> {
        *self.last_code.lock().unwrap() = Some(code.to_string());
        Ok(())
    }
}

struct SettlingGateway {
    submits: AtomicUsize,
}

#[async_trait]
impl WalletGateway for SettlingGateway {
    async fn submit(&self, payment: &Payment) -> Result<String> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Ok(format!("prov-{}", payment.reference_number))
    }

    async fn query_status(&self, _provider_ref: &str) -> Result<GatewayStatus> {
        Ok(GatewayStatus::Success)
    }
}

struct RaceHarness {
    service: PaymentService,
    repo: Arc<ContendedPaymentRepo>,
    notifier: Arc<CapturingNotifier>,
    gateway: Arc<SettlingGateway>,
}

async fn setup() -> anyhow::Result<RaceHarness> {
    let pool = SqlitePool::connect(":memory:").await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let mut settings = Settings::default();
    settings.gateway.backoff_base_ms = 1;

    let repo = Arc::new(ContendedPaymentRepo::new(pool.clone()));
    let notifier = Arc::new(CapturingNotifier {
        last_code: Mutex::new(None),
    });
    let gateway = Arc::new(SettlingGateway {
        submits: AtomicUsize::new(0),
    });

    let service = PaymentService::new(
        repo.clone(),
        Arc::new(SqliteMemberRepository::new(pool.clone())),
        Arc::new(SqlitePlanRepository::new(pool.clone())),
        gateway.clone(),
        OtpIssuer::new(notifier.clone(), settings.otp.clone()),
        settings.otp.clone(),
        settings.gateway.clone(),
    );

    Ok(RaceHarness {
        service,
        repo,
        notifier,
        gateway,
    })
}

impl RaceHarness {
    async fn pending_payment(&self) -> anyhow::Result<(Payment, String)> {
        let payment = self.service.create_payment("09171234567", "monthly").await?;
        let code = self.notifier.last_code.lock().unwrap().clone().unwrap();
        Ok((payment, code))
    }
}

/// Two verifies race; the rival commits first. The loser must observe the
/// rival's terminal state instead of charging the gateway a second time.
#[tokio::test]
async fn losing_verify_observes_the_rivals_completion() -> anyhow::Result<()> {
    let h = setup().await?;
    let (payment, code) = h.pending_payment().await?;

    h.repo.rival_completes.store(true, Ordering::SeqCst);

    let err = h.service.verify_payment(payment.id, &code).await.unwrap_err();
    assert!(matches!(err, AppError::PaymentAlreadyTerminal));

    // Exactly one completion, and it is the rival's.
    let status = h.service.get_status(payment.id).await?;
    assert_eq!(status.status, PaymentStatus::Completed);
    assert_eq!(h.gateway.submits.load(Ordering::SeqCst), 0);

    Ok(())
}

/// A single lost race is absorbed by the internal retry: the guarded write
/// fails once, the payment is reloaded and the verify still completes.
#[tokio::test]
async fn verify_retries_once_after_a_lost_version_race() -> anyhow::Result<()> {
    let h = setup().await?;
    let (payment, code) = h.pending_payment().await?;

    h.repo.bump_before_update.store(1, Ordering::SeqCst);

    let completed = h.service.verify_payment(payment.id, &code).await?;
    assert_eq!(completed.status, PaymentStatus::Completed);
    assert_eq!(h.gateway.submits.load(Ordering::SeqCst), 1);

    Ok(())
}

/// Contention on every attempt exhausts the retry budget and surfaces as a
/// conflict without mutating the payment.
#[tokio::test]
async fn persistent_contention_surfaces_as_conflict() -> anyhow::Result<()> {
    let h = setup().await?;
    let (payment, code) = h.pending_payment().await?;

    h.repo.bump_before_update.store(10, Ordering::SeqCst);

    let err = h.service.verify_payment(payment.id, &code).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // No attempt was consumed and nothing was charged.
    let status = h.service.get_status(payment.id).await?;
    assert_eq!(status.status, PaymentStatus::PendingOtp);
    assert_eq!(status.otp_attempts, 0);
    assert_eq!(h.gateway.submits.load(Ordering::SeqCst), 0);

    Ok(())
}

/// Losing the race at the finalization write means another writer already
/// settled the payment's fate; the loser must not stamp it Failed.
#[tokio::test]
async fn finalization_race_does_not_overwrite_the_winner() -> anyhow::Result<()> {
    let h = setup().await?;
    let (payment, code) = h.pending_payment().await?;

    h.repo.bump_before_complete.store(1, Ordering::SeqCst);

    let err = h.service.verify_payment(payment.id, &code).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let status = h.service.get_status(payment.id).await?;
    assert_ne!(status.status, PaymentStatus::Failed);
    assert!(status.failure_reason.is_none());

    Ok(())
}
