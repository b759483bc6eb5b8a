use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::convert::Infallible;
use tracing::warn;
use uuid::Uuid;

use super::repo::User;
use super::services::{cookie_value, ClientMeta, JwtKeys, TokenKind, ACCESS_COOKIE};
use crate::error::ApiError;
use crate::profiles::repo::Profile;
use crate::state::AppState;

/// Validated access token: the signed-in user and their session.
///
/// Only the token signature and expiry are checked; the session row is not
/// consulted, so an access token stays usable until it expires even after
/// logout deletes the session (which only blocks refresh).
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

/// Access token from `Authorization: Bearer`, falling back to the access cookie.
fn bearer_or_cookie(parts: &Parts) -> Result<String, ApiError> {
    if let Some(auth) = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        return auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::to_string)
            .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header".into()));
    }
    cookie_value(&parts.headers, ACCESS_COOKIE)
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = bearer_or_cookie(parts)?;

        let claims = match keys.verify(&token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(ApiError::Unauthorized("Invalid or expired token".into()));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err(ApiError::Unauthorized("Access token required".into()));
        }

        Ok(AuthUser {
            user_id: claims.sub,
            session_id: claims.sid,
        })
    }
}

/// Signed-in caller resolved to their marketplace profile.
#[derive(Debug, Clone, Copy)]
pub struct CurrentProfile {
    pub user_id: Uuid,
    pub profile_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentProfile {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let profile = Profile::find_by_user(&state.db, auth.user_id)
            .await?
            .ok_or_else(|| ApiError::Forbidden("Profile required".into()))?;
        Ok(CurrentProfile {
            user_id: auth.user_id,
            profile_id: profile.id,
        })
    }
}

/// Signed-in caller with the `admin` role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let user = User::find_by_id(&state.db, auth.user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
        if !user.is_admin() {
            warn!(user_id = %user.id, "admin route denied");
            return Err(ApiError::Forbidden("Admin role required".into()));
        }
        Ok(AdminUser(user.id))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientMeta::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, Request, StatusCode};

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/me");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn accepts_bearer_access_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let (uid, sid) = (Uuid::new_v4(), Uuid::new_v4());
        let token = keys.sign_access(uid, sid).unwrap();
        let mut parts = parts_with(&[(header::AUTHORIZATION.as_str(), &format!("Bearer {token}"))]);
        let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, uid);
        assert_eq!(user.session_id, sid);
    }

    #[tokio::test]
    async fn accepts_access_cookie() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let uid = Uuid::new_v4();
        let token = keys.sign_access(uid, Uuid::new_v4()).unwrap();
        let mut parts = parts_with(&[("cookie", &format!("{ACCESS_COOKIE}={token}"))]);
        let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, uid);
    }

    #[tokio::test]
    async fn rejects_refresh_token_as_access() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_refresh(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        let mut parts = parts_with(&[("authorization", &format!("Bearer {token}"))]);
        let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_missing_and_malformed_credentials() {
        let state = AppState::fake();
        let mut none = parts_with(&[]);
        assert!(AuthUser::from_request_parts(&mut none, &state).await.is_err());
        let mut basic = parts_with(&[("authorization", "Basic dXNlcjpwYXNz")]);
        assert!(AuthUser::from_request_parts(&mut basic, &state).await.is_err());
        let mut garbage = parts_with(&[("authorization", "Bearer not-a-jwt")]);
        assert!(AuthUser::from_request_parts(&mut garbage, &state).await.is_err());
    }
}
