use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::MembershipPlan,
    error::{AppError, Result},
    repository::PlanRepository,
};

#[derive(FromRow)]
struct PlanRow {
    id: String,
    name: String,
    slug: String,
    price_usd_cents: i64,
    duration_days: i64,
    active: bool,
    sort_order: i32,
}

pub struct SqlitePlanRepository {
    pool: SqlitePool,
}

impl SqlitePlanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_plan(row: PlanRow) -> Result<MembershipPlan> {
        Ok(MembershipPlan {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            name: row.name,
            slug: row.slug,
            price_usd_cents: row.price_usd_cents,
            duration_days: row.duration_days,
            active: row.active,
            sort_order: row.sort_order,
        })
    }
}

#[async_trait]
impl PlanRepository for SqlitePlanRepository {
    async fn list_active(&self) -> Result<Vec<MembershipPlan>> {
        let rows = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT id, name, slug, price_usd_cents, duration_days, active, sort_order
            FROM membership_plans
            WHERE active = 1
            ORDER BY sort_order ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_plan).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MembershipPlan>> {
        let row = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT id, name, slug, price_usd_cents, duration_days, active, sort_order
            FROM membership_plans
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_plan(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<MembershipPlan>> {
        let row = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT id, name, slug, price_usd_cents, duration_days, active, sort_order
            FROM membership_plans
            WHERE slug = ?
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_plan(r)?)),
            None => Ok(None),
        }
    }
}
