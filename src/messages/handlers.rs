use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    ConversationResponse, MarkReadResponse, MessageResponse, OpenedConversation,
    SendMessageRequest, StartConversationRequest,
};
use super::repo::{Conversation, Message};
use crate::{
    auth::extractors::CurrentProfile,
    error::{ApiError, ApiResult},
    pagination::{Page, PageParams},
    profiles::repo::Profile,
    services::repo::Service,
    state::AppState,
};

pub fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations).post(start_conversation))
        .route(
            "/conversations/:id/messages",
            get(list_messages).post(send_message),
        )
        .route("/conversations/:id/read", post(mark_read))
}

#[instrument(skip(state))]
pub async fn list_conversations(
    State(state): State<AppState>,
    me: CurrentProfile,
) -> ApiResult<Json<Vec<ConversationResponse>>> {
    let rows = Conversation::list_for(&state.db, me.profile_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn start_conversation(
    State(state): State<AppState>,
    me: CurrentProfile,
    Json(payload): Json<StartConversationRequest>,
) -> ApiResult<Json<OpenedConversation>> {
    if payload.recipient_id == me.profile_id {
        return Err(ApiError::validation("Cannot start a conversation with yourself"));
    }
    if Profile::find(&state.db, payload.recipient_id).await?.is_none() {
        return Err(ApiError::not_found("recipient"));
    }
    if let Some(service_id) = payload.service_id {
        if Service::find(&state.db, service_id).await?.is_none() {
            return Err(ApiError::not_found("service"));
        }
    }

    let conversation = Conversation::get_or_create(
        &state.db,
        me.profile_id,
        payload.recipient_id,
        payload.service_id,
    )
    .await?;
    info!(conversation_id = %conversation.id, "conversation opened");
    Ok(Json(OpenedConversation::new(conversation, me.profile_id)))
}

/// Load a conversation the caller takes part in.
async fn joined(state: &AppState, me: &CurrentProfile, id: Uuid) -> ApiResult<Conversation> {
    let conversation = Conversation::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("conversation"))?;
    if !conversation.has_participant(me.profile_id) {
        warn!(conversation_id = %id, profile_id = %me.profile_id, "conversation access denied");
        return Err(ApiError::Forbidden("Not a participant of this conversation".into()));
    }
    Ok(conversation)
}

#[instrument(skip(state))]
pub async fn list_messages(
    State(state): State<AppState>,
    me: CurrentProfile,
    Path(id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<MessageResponse>>> {
    page.validate()?;
    joined(&state, &me, id).await?;
    let (rows, total) = Message::page(&state.db, id, page).await?;
    let items = rows
        .into_iter()
        .map(|m| MessageResponse::new(m, me.profile_id))
        .collect();
    Ok(Json(Page::new(items, total, page)))
}

#[instrument(skip(state, payload))]
pub async fn send_message(
    State(state): State<AppState>,
    me: CurrentProfile,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let content = payload.into_content()?;
    joined(&state, &me, id).await?;
    let message = Message::create(&state.db, id, me.profile_id, &content).await?;
    info!(conversation_id = %id, message_id = %message.id, "message sent");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(message, me.profile_id)),
    ))
}

#[instrument(skip(state))]
pub async fn mark_read(
    State(state): State<AppState>,
    me: CurrentProfile,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MarkReadResponse>> {
    joined(&state, &me, id).await?;
    let marked = Message::mark_read(&state.db, id, me.profile_id).await?;
    Ok(Json(MarkReadResponse { marked }))
}
