use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{to_responses, CreateOrderRequest, OrderResponse, UpdateStatusRequest};
use super::repo::Order;
use super::status::{check_transition, Party};
use crate::{
    auth::extractors::CurrentProfile,
    error::{ApiError, ApiResult},
    services::repo::Service,
    state::AppState,
};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_purchases).post(create_order))
        .route("/orders/sales", get(list_sales))
        .route("/orders/:id/status", patch(update_status))
}

#[instrument(skip(state))]
pub async fn create_order(
    State(state): State<AppState>,
    me: CurrentProfile,
    Json(payload): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderResponse>)> {
    let mut tx = state.db.begin().await?;

    let service = Service::find(&mut *tx, payload.service_id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| ApiError::not_found("service"))?;
    if service.seller_id == me.profile_id {
        return Err(ApiError::Forbidden("Cannot order your own service".into()));
    }
    let order = Order::create(&mut *tx, me.profile_id, service.id, service.price).await?;

    tx.commit().await?;
    info!(order_id = %order.id, service_id = %service.id, amount = order.amount, "order placed");
    Ok((StatusCode::CREATED, Json(OrderResponse::try_from(order)?)))
}

#[instrument(skip(state))]
pub async fn list_purchases(
    State(state): State<AppState>,
    me: CurrentProfile,
) -> ApiResult<Json<Vec<OrderResponse>>> {
    let rows = Order::list_for_buyer(&state.db, me.profile_id).await?;
    Ok(Json(to_responses(rows)?))
}

#[instrument(skip(state))]
pub async fn list_sales(
    State(state): State<AppState>,
    me: CurrentProfile,
) -> ApiResult<Json<Vec<OrderResponse>>> {
    let rows = Order::list_for_seller(&state.db, me.profile_id).await?;
    Ok(Json(to_responses(rows)?))
}

#[instrument(skip(state))]
pub async fn update_status(
    State(state): State<AppState>,
    me: CurrentProfile,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<Json<OrderResponse>> {
    let view = Order::find_view(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("order"))?;

    let party = if view.order.buyer_id == me.profile_id {
        Party::Buyer
    } else if view.seller_id == me.profile_id {
        Party::Seller
    } else {
        return Err(ApiError::not_found("order"));
    };

    let from = view.order.status()?;
    let to = payload.status;
    if let Err(e) = check_transition(from, to, party) {
        warn!(order_id = %id, %from, %to, ?party, "order transition rejected");
        return Err(e);
    }

    if Order::transition(&state.db, id, from, to).await?.is_none() {
        return Err(ApiError::Conflict("Order status changed, reload and retry".into()));
    }
    info!(order_id = %id, %from, %to, ?party, "order status changed");

    let updated = Order::find_view(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("order"))?;
    Ok(Json(OrderResponse::try_from(updated)?))
}
