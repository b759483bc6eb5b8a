use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{ProfileResponse, PublicProfileResponse, UpdateProfileRequest};
use super::repo::Profile;
use crate::{
    auth::extractors::CurrentProfile,
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/me/profile", patch(update_my_profile))
        .route("/profiles/:id", get(get_profile))
}

#[instrument(skip(state, payload))]
pub async fn update_my_profile(
    State(state): State<AppState>,
    me: CurrentProfile,
    Json(mut payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    payload.validate()?;
    let profile = Profile::update(
        &state.db,
        me.profile_id,
        payload.display_name.as_deref(),
        payload.bio.as_deref(),
        payload.avatar_url.as_deref(),
    )
    .await?;
    info!(profile_id = %profile.id, "profile updated");
    Ok(Json(profile.into()))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublicProfileResponse>> {
    let profile = Profile::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("profile"))?;
    let stats = Profile::seller_stats(&state.db, id).await?;
    Ok(Json(PublicProfileResponse::new(profile, stats)))
}
