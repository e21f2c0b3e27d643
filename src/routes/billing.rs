use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::billing::Price;

/// GET /api/stripe/config — Active subscription prices for the pricing page.
pub async fn stripe_config(State(state): State<AppState>) -> AppResult<Json<Vec<Price>>> {
    let billing = state.billing.as_ref().ok_or(AppError::BillingUnavailable)?;
    let prices = billing.list_prices().await?;
    Ok(Json(prices))
}
