use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CategoryInput, CategoryResponse};
use super::repo::Category;
use crate::{
    auth::extractors::AdminUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:category",
            get(get_category)
                .put(replace_category)
                .delete(delete_category),
        )
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CategoryResponse>>> {
    let rows = Category::list(&state.db).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<CategoryResponse>> {
    let category = Category::find_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::not_found("category"))?;
    Ok(Json(category.into()))
}

#[instrument(skip(state, payload))]
pub async fn create_category(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Json(payload): Json<CategoryInput>,
) -> ApiResult<(StatusCode, Json<CategoryResponse>)> {
    let input = payload.validate()?;
    let category = Category::create(&state.db, &input).await?;
    info!(%admin_id, slug = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(category.into())))
}

#[instrument(skip(state, payload))]
pub async fn replace_category(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryInput>,
) -> ApiResult<Json<CategoryResponse>> {
    let input = payload.validate()?;
    let category = Category::replace(&state.db, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("category"))?;
    info!(%admin_id, slug = %category.slug, "category updated");
    Ok(Json(category.into()))
}

#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Category::delete(&state.db, id).await? {
        return Err(ApiError::not_found("category"));
    }
    info!(%admin_id, %id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}
