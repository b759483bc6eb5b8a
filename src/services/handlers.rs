use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    CreateServiceRequest, CreatedServiceResponse, ServiceDetail, ServiceDraft, ServiceListItem,
    UpdateServiceRequest,
};
use super::filter::{ListingFilter, ListingQuery};
use super::repo::Service;
use crate::{
    auth::extractors::CurrentProfile,
    categories::repo::Category,
    error::{ApiError, ApiResult},
    pagination::Page,
    state::AppState,
};

pub fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/services", get(list_services).post(create_service))
        .route("/services/count", get(count_services))
        .route(
            "/services/:id",
            get(get_service).patch(update_service).delete(delete_service),
        )
        .route("/categories/:category/services", get(list_by_category))
}

#[instrument(skip(state))]
pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> ApiResult<Json<Page<ServiceListItem>>> {
    let filter = ListingFilter::try_from(query)?;
    let (items, total) = Service::list(&state.db, &filter).await?;
    Ok(Json(Page::new(items, total, filter.page)))
}

#[instrument(skip(state))]
pub async fn count_services(State(state): State<AppState>) -> ApiResult<Json<i64>> {
    Ok(Json(Service::count_active(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn list_by_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ListingQuery>,
) -> ApiResult<Json<Page<ServiceListItem>>> {
    let filter = ListingFilter::try_from(query)?;
    let Some(category) = Category::find_by_slug(&state.db, &slug).await? else {
        return Ok(Json(Page::empty(filter.page)));
    };
    let filter = filter.in_category(category.id);
    let (items, total) = Service::list(&state.db, &filter).await?;
    Ok(Json(Page::new(items, total, filter.page)))
}

#[instrument(skip(state))]
pub async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ServiceDetail>> {
    let row = Service::find_detail(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("service"))?;
    Ok(Json(row.into()))
}

async fn ensure_category(state: &AppState, category_id: Uuid) -> ApiResult<()> {
    if !Category::exists(&state.db, category_id).await? {
        return Err(ApiError::validation("unknown categoryId"));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn create_service(
    State(state): State<AppState>,
    me: CurrentProfile,
    Json(payload): Json<CreateServiceRequest>,
) -> ApiResult<(StatusCode, Json<CreatedServiceResponse>)> {
    let draft = ServiceDraft::from(payload).validate()?;
    ensure_category(&state, draft.category_id).await?;

    let service = Service::create(&state.db, me.profile_id, &draft).await?;
    info!(service_id = %service.id, seller_id = %me.profile_id, "service listed");
    Ok((
        StatusCode::CREATED,
        Json(CreatedServiceResponse {
            id: service.id,
            created_at: service.created_at,
        }),
    ))
}

/// Load a service and require the caller to be its seller.
async fn owned_service(state: &AppState, me: &CurrentProfile, id: Uuid) -> ApiResult<Service> {
    let service = Service::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("service"))?;
    if service.seller_id != me.profile_id {
        warn!(service_id = %id, profile_id = %me.profile_id, "service owned by another seller");
        return Err(ApiError::Forbidden("Not the owner of this service".into()));
    }
    Ok(service)
}

#[instrument(skip(state, payload))]
pub async fn update_service(
    State(state): State<AppState>,
    me: CurrentProfile,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateServiceRequest>,
) -> ApiResult<Json<ServiceDetail>> {
    let current = owned_service(&state, &me, id).await?;
    let is_active = payload.is_active.unwrap_or(current.is_active);
    let category_changed = payload
        .category_id
        .is_some_and(|c| c != current.category_id);

    let draft = payload.apply(ServiceDraft::from(current)).validate()?;
    if category_changed {
        ensure_category(&state, draft.category_id).await?;
    }

    Service::update(&state.db, id, &draft, is_active)
        .await?
        .ok_or_else(|| ApiError::not_found("service"))?;
    info!(service_id = %id, is_active, "service updated");

    let row = Service::find_owner_detail(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("service"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
pub async fn delete_service(
    State(state): State<AppState>,
    me: CurrentProfile,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    owned_service(&state, &me, id).await?;
    Service::set_active(&state.db, id, false).await?;
    info!(service_id = %id, "service deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn invalid_listing_query_is_rejected_before_any_query() {
        let app = service_routes().with_state(AppState::fake());
        let res = app
            .oneshot(
                Request::get("/services?minPrice=50&maxPrice=10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_requires_sign_in() {
        let app = service_routes().with_state(AppState::fake());
        let res = app
            .oneshot(
                Request::post("/services")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"title":"x","description":"y","price":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
