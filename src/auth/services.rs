pub(crate) use crate::auth::dto::{Claims, JwtKeys, TokenKind};
use crate::auth::dto::RegisterRequest;
use crate::auth::repo::Session;
use crate::config::SessionConfig;
use crate::error::ApiError;
use crate::state::AppState;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::FromRef;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error};
use uuid::Uuid;

pub const ACCESS_COOKIE: &str = "am_access";
pub const REFRESH_COOKIE: &str = "am_refresh";
pub const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalizes the request in place and rejects malformed input.
pub(crate) fn validate_registration(req: &mut RegisterRequest) -> Result<(), ApiError> {
    req.email = normalize_email(&req.email);
    req.name = req.name.trim().to_string();

    if req.name.is_empty() || req.name.chars().count() > 100 {
        return Err(ApiError::validation("Name must be 1 to 100 characters"));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::validation("Invalid email"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password too short"));
    }
    if req.password.len() > MAX_PASSWORD_LEN {
        return Err(ApiError::validation("Password too long"));
    }
    Ok(())
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let jwt = &state.config.jwt;
        Self {
            encoding: EncodingKey::from_secret(jwt.secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt.secret.as_bytes()),
            issuer: jwt.issuer.clone(),
            audience: jwt.audience.clone(),
            access_ttl: Duration::from_secs((jwt.ttl_minutes.max(1) as u64) * 60),
            refresh_ttl: Duration::from_secs((state.config.session.ttl_minutes.max(1) as u64) * 60),
        }
    }
}

impl JwtKeys {
    fn sign_with_kind(&self, user_id: Uuid, session_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            sid: session_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, session_id = %session_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid, session_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, session_id, TokenKind::Access)
    }
    pub fn sign_refresh(&self, user_id: Uuid, session_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, session_id, TokenKind::Refresh)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }
}

/// Token pair bound to one persisted session.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub session_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

impl IssuedTokens {
    pub fn sign(keys: &JwtKeys, user_id: Uuid, session_id: Uuid) -> anyhow::Result<Self> {
        Ok(Self {
            session_id,
            access_token: keys.sign_access(user_id, session_id)?,
            refresh_token: keys.sign_refresh(user_id, session_id)?,
        })
    }
}

/// Caller details recorded on the session row.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        Self {
            ip_address: header("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_string())
                .or_else(|| header("x-real-ip").map(str::to_string)),
            user_agent: header("user-agent").map(|v| v.chars().take(512).collect()),
        }
    }
}

/// Persist a session for the user and sign its token pair.
pub async fn open_session(
    state: &AppState,
    user_id: Uuid,
    meta: &ClientMeta,
) -> anyhow::Result<IssuedTokens> {
    let expires_at = session_expiry(&state.config.session, OffsetDateTime::now_utc());
    let session = Session::create(
        &state.db,
        user_id,
        expires_at,
        meta.ip_address.as_deref(),
        meta.user_agent.as_deref(),
    )
    .await?;
    IssuedTokens::sign(&JwtKeys::from_ref(state), user_id, session.id)
}

pub(crate) fn session_expiry(cfg: &SessionConfig, now: OffsetDateTime) -> OffsetDateTime {
    now + TimeDuration::minutes(cfg.ttl_minutes)
}

/// A session last touched more than `update_age` ago gets its expiry pushed.
pub(crate) fn session_needs_extension(
    cfg: &SessionConfig,
    updated_at: OffsetDateTime,
    now: OffsetDateTime,
) -> bool {
    now - updated_at >= TimeDuration::minutes(cfg.update_age_minutes)
}

fn cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut c = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        c.push_str("; Secure");
    }
    c
}

/// `Set-Cookie` values carrying the token pair.
pub fn session_cookies(state: &AppState, tokens: &IssuedTokens) -> [String; 2] {
    let secure = state.config.session.cookie_secure;
    [
        cookie(ACCESS_COOKIE, &tokens.access_token, state.config.jwt.ttl_minutes * 60, secure),
        cookie(
            REFRESH_COOKIE,
            &tokens.refresh_token,
            state.config.session.ttl_minutes * 60,
            secure,
        ),
    ]
}

pub fn cleared_cookies(state: &AppState) -> [String; 2] {
    let secure = state.config.session.cookie_secure;
    [
        cookie(ACCESS_COOKIE, "", 0, secure),
        cookie(REFRESH_COOKIE, "", 0, secure),
    ]
}

/// Value of a cookie from the `Cookie` request header(s).
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v.to_string())
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn registration_normalizes_and_validates() {
        let mut req = RegisterRequest {
            name: "  Ada Lovelace ".into(),
            email: "  Ada@Example.COM ".into(),
            password: "long-enough".into(),
        };
        validate_registration(&mut req).unwrap();
        assert_eq!(req.email, "ada@example.com");
        assert_eq!(req.name, "Ada Lovelace");

        let mut short = RegisterRequest {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "short".into(),
        };
        assert!(validate_registration(&mut short).is_err());

        let mut nameless = RegisterRequest {
            name: "   ".into(),
            email: "ada@example.com".into(),
            password: "long-enough".into(),
        };
        assert!(validate_registration(&mut nameless).is_err());
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("buyer@market.dev"));
        assert!(!is_valid_email("buyer@market"));
        assert!(!is_valid_email("no spaces@market.dev"));
    }
}

#[cfg(test)]
mod jwt_tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_access_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let token = keys.sign_access(user_id, session_id).expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.sid, session_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn sign_and_verify_refresh_token_and_verify_refresh() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_refresh(user_id, Uuid::new_v4()).expect("sign refresh");
        let claims = keys.verify_refresh(&token).expect("verify refresh");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[tokio::test]
    async fn verify_refresh_rejects_access_token() {
        let keys = make_keys();
        let token = keys.sign_access(Uuid::new_v4(), Uuid::new_v4()).expect("sign access");
        let err = keys.verify_refresh(&token).unwrap_err();
        assert!(err.to_string().contains("not a refresh token"));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys();
        let mut bad_keys = make_keys();
        bad_keys.issuer = "bad-iss".into();
        bad_keys.audience = "bad-aud".into();
        let token = good_keys.sign_access(Uuid::new_v4(), Uuid::new_v4()).expect("sign access");
        assert!(bad_keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn token_pair_shares_session() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let sid = Uuid::new_v4();
        let pair = IssuedTokens::sign(&keys, user_id, sid).unwrap();
        assert_eq!(keys.verify(&pair.access_token).unwrap().sid, sid);
        assert_eq!(keys.verify_refresh(&pair.refresh_token).unwrap().sid, sid);
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;
    use axum::http::HeaderValue;

    fn cfg() -> SessionConfig {
        SessionConfig {
            ttl_minutes: 60 * 24 * 7,
            update_age_minutes: 60 * 24,
            cookie_secure: true,
        }
    }

    #[test]
    fn extension_after_update_age() {
        let now = OffsetDateTime::now_utc();
        assert!(!session_needs_extension(&cfg(), now - TimeDuration::hours(2), now));
        assert!(session_needs_extension(&cfg(), now - TimeDuration::hours(25), now));
    }

    #[test]
    fn expiry_is_ttl_ahead() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(session_expiry(&cfg(), now) - now, TimeDuration::days(7));
    }

    #[test]
    fn reads_cookie_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; am_access=abc.def.ghi; am_refresh="),
        );
        assert_eq!(cookie_value(&headers, ACCESS_COOKIE).as_deref(), Some("abc.def.ghi"));
        assert_eq!(cookie_value(&headers, REFRESH_COOKIE), None);
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn client_meta_takes_first_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));
        let meta = ClientMeta::from_headers(&headers);
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[tokio::test]
    async fn cookies_are_http_only_and_cleared_with_zero_age() {
        let state = AppState::fake();
        let tokens = IssuedTokens {
            session_id: Uuid::new_v4(),
            access_token: "a".into(),
            refresh_token: "r".into(),
        };
        let [access, refresh] = session_cookies(&state, &tokens);
        assert!(access.starts_with("am_access=a;"));
        assert!(access.contains("HttpOnly"));
        assert!(access.contains("Max-Age=300"));
        assert!(refresh.contains("Max-Age=3600"));
        let [cleared, _] = cleared_cookies(&state);
        assert!(cleared.contains("Max-Age=0"));
    }
}
