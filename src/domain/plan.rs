use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable membership plan. Prices are listed in USD cents; the
/// wallet charge is converted to PHP centavos at payment creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipPlan {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub price_usd_cents: i64,
    pub duration_days: i64,
    pub active: bool,
    pub sort_order: i32,
}

impl MembershipPlan {
    /// Charge amount in PHP centavos at the configured conversion rate,
    /// rounded to the nearest centavo.
    pub fn amount_centavos(&self, php_per_usd: f64) -> i64 {
        (self.price_usd_cents as f64 * php_per_usd).round() as i64
    }
}
