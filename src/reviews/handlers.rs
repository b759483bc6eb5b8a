use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CreateReviewRequest, ReviewList, ReviewResponse};
use super::repo::Review;
use crate::{
    auth::extractors::CurrentProfile,
    error::{ApiError, ApiResult},
    services::repo::Service,
    state::AppState,
};

pub fn review_routes() -> Router<AppState> {
    Router::new().route("/services/:id/reviews", get(list_reviews).post(create_review))
}

#[instrument(skip(state))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
) -> ApiResult<Json<ReviewList>> {
    if Service::find(&state.db, service_id).await?.is_none() {
        return Err(ApiError::not_found("service"));
    }
    let rows = Review::list_for_service(&state.db, service_id).await?;
    Ok(Json(rows.into()))
}

#[instrument(skip(state, payload))]
pub async fn create_review(
    State(state): State<AppState>,
    me: CurrentProfile,
    Path(service_id): Path<Uuid>,
    Json(mut payload): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<ReviewResponse>)> {
    payload.validate()?;

    let service = Service::find(&state.db, service_id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| ApiError::not_found("service"))?;
    if service.seller_id == me.profile_id {
        return Err(ApiError::Forbidden("Cannot review your own service".into()));
    }
    if Review::exists_for(&state.db, service_id, me.profile_id).await? {
        return Err(ApiError::Conflict("You have already reviewed this service".into()));
    }

    let review = Review::create(
        &state.db,
        service_id,
        me.profile_id,
        payload.rating,
        payload.comment.as_deref(),
    )
    .await?;
    info!(%service_id, author_id = %me.profile_id, rating = review.rating, "review posted");
    Ok((StatusCode::CREATED, Json(review.into())))
}
