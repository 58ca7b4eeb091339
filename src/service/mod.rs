pub mod payment_service;
pub mod plan_service;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::{
    config::Settings,
    gateway::WalletGateway,
    notify::OtpNotifier,
    otp::OtpIssuer,
    repository::{SqliteMemberRepository, SqlitePaymentRepository, SqlitePlanRepository},
};

pub use payment_service::PaymentService;
pub use plan_service::{PlanPricing, PlanService};

pub struct ServiceContext {
    pub payment_service: Arc<PaymentService>,
    pub plan_service: Arc<PlanService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        gateway: Arc<dyn WalletGateway>,
        notifier: Arc<dyn OtpNotifier>,
        settings: &Settings,
    ) -> Self {
        let payment_repo = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let member_repo = Arc::new(SqliteMemberRepository::new(db_pool.clone()));
        let plan_repo = Arc::new(SqlitePlanRepository::new(db_pool.clone()));

        let issuer = OtpIssuer::new(notifier, settings.otp.clone());

        let payment_service = Arc::new(PaymentService::new(
            payment_repo,
            member_repo,
            plan_repo.clone(),
            gateway,
            issuer,
            settings.otp.clone(),
            settings.gateway.clone(),
        ));
        let plan_service = Arc::new(PlanService::new(plan_repo, settings.gateway.php_per_usd));

        Self {
            payment_service,
            plan_service,
            db_pool,
        }
    }
}
