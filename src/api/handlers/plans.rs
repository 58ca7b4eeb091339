use axum::{extract::State, Json};

use crate::{api::state::AppState, error::Result, service::PlanPricing};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<PlanPricing>>> {
    let pricing = state.service_context.plan_service.list_pricing().await?;
    Ok(Json(pricing))
}
