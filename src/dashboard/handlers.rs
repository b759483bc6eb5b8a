use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::dto::{BuyerDashboard, SellerDashboard};
use super::repo;
use crate::{
    auth::extractors::CurrentProfile,
    error::ApiResult,
    orders::{dto::to_responses, repo::Order},
    state::AppState,
};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/buyer", get(buyer_dashboard))
        .route("/dashboard/seller", get(seller_dashboard))
}

#[instrument(skip(state))]
pub async fn buyer_dashboard(
    State(state): State<AppState>,
    me: CurrentProfile,
) -> ApiResult<Json<BuyerDashboard>> {
    let purchases = Order::list_for_buyer(&state.db, me.profile_id).await?;
    Ok(Json(BuyerDashboard::new(to_responses(purchases)?)))
}

#[instrument(skip(state))]
pub async fn seller_dashboard(
    State(state): State<AppState>,
    me: CurrentProfile,
) -> ApiResult<Json<SellerDashboard>> {
    let rows = repo::seller_services(&state.db, me.profile_id).await?;
    let customers = repo::active_customers(&state.db, me.profile_id).await?;
    Ok(Json(SellerDashboard::new(rows, customers)))
}
