use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Persisted sign-in lifetime. A refresh older than `update_age_minutes`
/// pushes `expires_at` forward again.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ttl_minutes: i64,
    pub update_age_minutes: i64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SocialConfig {
    pub google: Option<OAuthClient>,
    pub github: Option<OAuthClient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
    pub social: SocialConfig,
    /// Frontend base url, target of post-login redirects.
    pub app_url: String,
    /// Externally reachable base url of this API, used for OAuth callbacks.
    pub public_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            get(key).ok_or_else(|| anyhow::anyhow!("missing environment variable {key}"))
        };
        let number = |key: &str, default: i64| {
            get(key)
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(default)
        };
        let client = |id: &str, secret: &str| match (get(id), get(secret)) {
            (Some(client_id), Some(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                Some(OAuthClient {
                    client_id,
                    client_secret,
                })
            }
            _ => None,
        };

        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "apimarket".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "apimarket-users".into()),
            ttl_minutes: number("JWT_TTL_MINUTES", 15),
        };
        let session = SessionConfig {
            ttl_minutes: number("SESSION_TTL_MINUTES", 60 * 24 * 7),
            update_age_minutes: number("SESSION_UPDATE_AGE_MINUTES", 60 * 24),
            cookie_secure: get("COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };
        let social = SocialConfig {
            google: client("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            github: client("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
        };

        Ok(Self {
            database_url,
            db_max_connections: number("DB_MAX_CONNECTIONS", 10) as u32,
            jwt,
            session,
            social,
            app_url: trim_slash(get("APP_URL").unwrap_or_else(|| "http://localhost:3000".into())),
            public_url: trim_slash(
                get("PUBLIC_URL").unwrap_or_else(|| "http://localhost:8080".into()),
            ),
        })
    }
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
