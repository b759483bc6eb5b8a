use axum::{
    extract::{FromRef, Path, Query, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderName, StatusCode},
    response::{AppendHeaders, Redirect},
    routing::{get, post},
    Json, Router,
};
use sqlx::{Postgres, Transaction};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{error, info, instrument, warn};
use url::Url;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, MeResponse, PublicUser, RefreshRequest, RegisterRequest,
            SocialCallbackQuery,
        },
        extractors::AuthUser,
        repo::{Account, Session, User, Verification},
        services::{
            cleared_cookies, cookie_value, hash_password, is_valid_email, normalize_email,
            open_session, session_cookies, session_expiry, session_needs_extension,
            validate_registration, verify_password, ClientMeta, IssuedTokens, JwtKeys,
            REFRESH_COOKIE,
        },
        social::{self, Provider, SocialProfile},
    },
    error::{ApiError, ApiResult},
    profiles::repo::Profile,
    state::AppState,
};

type CookieHeaders = AppendHeaders<[(HeaderName, String); 2]>;

const OAUTH_STATE_TTL_MINUTES: i64 = 10;

fn set_cookies([access, refresh]: [String; 2]) -> CookieHeaders {
    AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)])
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/social/:provider", get(social_start))
        .route("/auth/social/:provider/callback", get(social_callback))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn auth_response(tokens: IssuedTokens, user: User) -> AuthResponse {
    AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user: PublicUser::from(user),
    }
}

#[instrument(skip(state, meta, payload))]
pub async fn register(
    State(state): State<AppState>,
    meta: ClientMeta,
    Json(mut payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, CookieHeaders, Json<AuthResponse>)> {
    if let Err(e) = validate_registration(&mut payload) {
        warn!(email = %payload.email, error = %e, "invalid registration");
        return Err(e);
    }

    // Ensure email is not taken
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password).map_err(ApiError::Internal)?;

    let mut tx = state.db.begin().await?;
    let user = User::create(&mut *tx, &payload.name, &payload.email, false, None).await?;
    Account::create_credential(&mut *tx, user.id, &hash).await?;
    Profile::create(&mut *tx, user.id, &user.name, None).await?;
    tx.commit().await?;

    let tokens = open_session(&state, user.id, &meta).await?;
    let cookies = set_cookies(session_cookies(&state, &tokens));

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, cookies, Json(auth_response(tokens, user))))
}

#[instrument(skip(state, meta, payload))]
pub async fn login(
    State(state): State<AppState>,
    meta: ClientMeta,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<(CookieHeaders, Json<AuthResponse>)> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }

    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(invalid());
    };

    let Some(hash) = Account::find_credential(&state.db, user.id)
        .await?
        .and_then(|a| a.password)
    else {
        warn!(user_id = %user.id, "login on account without password");
        return Err(invalid());
    };

    let ok = verify_password(&payload.password, &hash).map_err(|e| {
        error!(error = %e, "verify_password failed");
        ApiError::Internal(e)
    })?;
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    let tokens = open_session(&state, user.id, &meta).await?;
    let cookies = set_cookies(session_cookies(&state, &tokens));

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((cookies, Json(auth_response(tokens, user))))
}

#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> ApiResult<(CookieHeaders, Json<AuthResponse>)> {
    let token = payload
        .and_then(|Json(p)| p.refresh_token)
        .or_else(|| cookie_value(&headers, REFRESH_COOKIE))
        .ok_or_else(|| ApiError::Unauthorized("Missing refresh token".into()))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let session = Session::find(&state.db, claims.sid)
        .await?
        .filter(|s| s.user_id == claims.sub)
        .ok_or_else(|| ApiError::Unauthorized("Session revoked".into()))?;

    let now = OffsetDateTime::now_utc();
    if session.expires_at <= now {
        Session::delete(&state.db, session.id).await?;
        return Err(ApiError::Unauthorized("Session expired".into()));
    }
    if session_needs_extension(&state.config.session, session.updated_at, now) {
        Session::extend(&state.db, session.id, session_expiry(&state.config.session, now)).await?;
    }

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    // Issue new pair
    let tokens = IssuedTokens::sign(&keys, user.id, session.id)?;
    let cookies = set_cookies(session_cookies(&state, &tokens));
    Ok((cookies, Json(auth_response(tokens, user))))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<(StatusCode, CookieHeaders)> {
    let removed = Session::delete(&state.db, auth.session_id).await?;
    info!(user_id = %auth.user_id, session_id = %auth.session_id, removed, "user logged out");
    Ok((StatusCode::NO_CONTENT, set_cookies(cleared_cookies(&state))))
}

#[instrument(skip(state))]
pub async fn get_me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<MeResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| {
            error!(user_id = %auth.user_id, "user not found");
            ApiError::Unauthorized("User not found".into())
        })?;
    let profile = Profile::find_by_user(&state.db, user.id).await?;

    Ok(Json(MeResponse {
        user: PublicUser::from(user),
        profile: profile.map(Into::into),
    }))
}

fn configured_provider(state: &AppState, name: &str) -> ApiResult<Provider> {
    let provider: Provider = name
        .parse()
        .map_err(|_| ApiError::not_found("provider"))?;
    if provider.client(&state.config.social).is_none() {
        return Err(ApiError::NotFound(format!("{name} sign-in is not configured")));
    }
    Ok(provider)
}

/// Frontend url with an optional `error` query parameter.
fn frontend_url(app_url: &str, path: &str, error: Option<&str>) -> String {
    match (Url::parse(&format!("{app_url}{path}")), error) {
        (Ok(mut url), Some(e)) => {
            url.query_pairs_mut().append_pair("error", e);
            url.to_string()
        }
        (Ok(url), None) => url.to_string(),
        (Err(_), _) => format!("{app_url}{path}"),
    }
}

#[instrument(skip(state))]
pub async fn social_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> ApiResult<Redirect> {
    let provider = configured_provider(&state, &provider)?;
    let client = provider
        .client(&state.config.social)
        .ok_or_else(|| ApiError::not_found("provider"))?;

    let oauth_state = social::random_state();
    let expires_at = OffsetDateTime::now_utc() + TimeDuration::minutes(OAUTH_STATE_TTL_MINUTES);
    Verification::create(
        &state.db,
        &social::state_identifier(&oauth_state),
        provider.id(),
        expires_at,
    )
    .await?;

    let redirect_uri = social::callback_url(&state.config.public_url, provider);
    let url = social::authorize_url(provider, client, &redirect_uri, &oauth_state)?;
    Ok(Redirect::to(url.as_str()))
}

#[instrument(skip(state, meta, q))]
pub async fn social_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    meta: ClientMeta,
    Query(q): Query<SocialCallbackQuery>,
) -> ApiResult<(CookieHeaders, Redirect)> {
    let provider = configured_provider(&state, &provider)?;
    let client = provider
        .client(&state.config.social)
        .ok_or_else(|| ApiError::not_found("provider"))?;

    if let Some(err) = q.error.as_deref() {
        warn!(provider = provider.id(), error = err, "provider denied sign-in");
        let target = frontend_url(&state.config.app_url, "/login", Some(err));
        return Ok((set_cookies(cleared_cookies(&state)), Redirect::to(&target)));
    }

    let (Some(code), Some(oauth_state)) = (q.code, q.state) else {
        return Err(ApiError::validation("code and state are required"));
    };

    let stored = Verification::consume(&state.db, &social::state_identifier(&oauth_state))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid OAuth state".into()))?;
    if stored.value != provider.id() || stored.expires_at <= OffsetDateTime::now_utc() {
        warn!(provider = provider.id(), "stale or mismatched OAuth state");
        return Err(ApiError::Unauthorized("Invalid OAuth state".into()));
    }

    let redirect_uri = social::callback_url(&state.config.public_url, provider);
    let access_token =
        social::exchange_code(&state.http, provider, client, &code, &redirect_uri).await?;
    let mut profile = social::fetch_profile(&state.http, provider, &access_token).await?;
    profile.email = normalize_email(&profile.email);

    let mut tx = state.db.begin().await?;
    let user = link_or_create_user(&mut tx, provider, &profile, &access_token).await?;
    tx.commit().await?;

    let tokens = open_session(&state, user.id, &meta).await?;
    info!(user_id = %user.id, provider = provider.id(), "social sign-in");

    let target = frontend_url(&state.config.app_url, "/dashboard", None);
    Ok((
        set_cookies(session_cookies(&state, &tokens)),
        Redirect::to(&target),
    ))
}

/// Existing provider link wins, then a verified email match, else a new
/// user with profile.
async fn link_or_create_user(
    tx: &mut Transaction<'_, Postgres>,
    provider: Provider,
    profile: &SocialProfile,
    access_token: &str,
) -> ApiResult<User> {
    let scope = provider.scope();

    if let Some(account) =
        Account::find_by_provider(&mut **tx, provider.id(), &profile.account_id).await?
    {
        Account::upsert_social(
            &mut **tx,
            account.user_id,
            provider.id(),
            &profile.account_id,
            access_token,
            scope,
        )
        .await?;
        return User::find_by_id(&mut **tx, account.user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("user"));
    }

    if let Some(user) = User::find_by_email(&mut **tx, &profile.email).await? {
        if !profile.email_verified {
            warn!(email = %profile.email, provider = provider.id(), "unverified email matches existing user");
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Account::upsert_social(
            &mut **tx,
            user.id,
            provider.id(),
            &profile.account_id,
            access_token,
            scope,
        )
        .await?;
        return Ok(user);
    }

    let user = User::create(
        &mut **tx,
        &profile.name,
        &profile.email,
        profile.email_verified,
        profile.image.as_deref(),
    )
    .await?;
    Account::upsert_social(
        &mut **tx,
        user.id,
        provider.id(),
        &profile.account_id,
        access_token,
        scope,
    )
    .await?;
    Profile::create(&mut **tx, user.id, &user.name, user.image.as_deref()).await?;
    Ok(user)
}
