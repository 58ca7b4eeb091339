use std::sync::Arc;

use uuid::Uuid;

use crate::{error::Result, repository::PlanRepository};

pub struct PlanService {
    repo: Arc<dyn PlanRepository>,
    php_per_usd: f64,
}

impl PlanService {
    pub fn new(repo: Arc<dyn PlanRepository>, php_per_usd: f64) -> Self {
        Self { repo, php_per_usd }
    }

    /// Pricing for all active plans, with the charge amount the client
    /// will actually be billed through the wallet.
    pub async fn list_pricing(&self) -> Result<Vec<PlanPricing>> {
        let plans = self.repo.list_active().await?;
        Ok(plans
            .into_iter()
            .map(|p| {
                let amount_centavos = p.amount_centavos(self.php_per_usd);
                PlanPricing {
                    plan_id: p.id,
                    name: p.name,
                    slug: p.slug,
                    price_usd_cents: p.price_usd_cents,
                    amount_centavos,
                    currency: "PHP".to_string(),
                    duration_days: p.duration_days,
                }
            })
            .collect())
    }
}

/// Pricing information for a membership plan
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlanPricing {
    pub plan_id: Uuid,
    pub name: String,
    pub slug: String,
    pub price_usd_cents: i64,
    pub amount_centavos: i64,
    pub currency: String,
    pub duration_days: i64,
}
