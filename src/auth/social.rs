//! OAuth2 authorization-code sign-in with Google and GitHub.

use anyhow::{bail, Context};
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;
use url::Url;

use crate::config::{OAuthClient, SocialConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Github,
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Provider::Google),
            "github" => Ok(Provider::Github),
            other => bail!("unknown provider {other}"),
        }
    }
}

impl Provider {
    pub fn id(self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Github => "github",
        }
    }

    fn authorize_endpoint(self) -> &'static str {
        match self {
            Provider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            Provider::Github => "https://github.com/login/oauth/authorize",
        }
    }

    fn token_endpoint(self) -> &'static str {
        match self {
            Provider::Google => "https://oauth2.googleapis.com/token",
            Provider::Github => "https://github.com/login/oauth/access_token",
        }
    }

    pub fn scope(self) -> &'static str {
        match self {
            Provider::Google => "openid email profile",
            Provider::Github => "read:user user:email",
        }
    }

    pub fn client(self, cfg: &SocialConfig) -> Option<&OAuthClient> {
        match self {
            Provider::Google => cfg.google.as_ref(),
            Provider::Github => cfg.github.as_ref(),
        }
    }
}

/// Identity returned by a provider after a successful exchange.
#[derive(Debug, Clone)]
pub struct SocialProfile {
    pub account_id: String,
    pub email: String,
    pub email_verified: bool,
    pub name: String,
    pub image: Option<String>,
}

pub fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

pub fn state_identifier(state: &str) -> String {
    format!("oauth-state:{state}")
}

pub fn callback_url(public_url: &str, provider: Provider) -> String {
    format!("{public_url}/api/v1/auth/social/{}/callback", provider.id())
}

pub fn authorize_url(
    provider: Provider,
    client: &OAuthClient,
    redirect_uri: &str,
    state: &str,
) -> anyhow::Result<Url> {
    let mut url = Url::parse(provider.authorize_endpoint())?;
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("client_id", &client.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", provider.scope())
            .append_pair("state", state);
        if provider == Provider::Google {
            q.append_pair("prompt", "select_account");
        }
    }
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Trade the authorization code for a provider access token.
pub async fn exchange_code(
    http: &reqwest::Client,
    provider: Provider,
    client: &OAuthClient,
    code: &str,
    redirect_uri: &str,
) -> anyhow::Result<String> {
    let resp: TokenResponse = http
        .post(provider.token_endpoint())
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&[
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .context("token request")?
        .json()
        .await
        .context("decode token response")?;

    match (resp.access_token, resp.error) {
        (Some(token), None) => Ok(token),
        (_, error) => bail!(
            "{} token exchange failed: {} {}",
            provider.id(),
            error.unwrap_or_default(),
            resp.error_description.unwrap_or_default()
        ),
    }
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

pub async fn fetch_profile(
    http: &reqwest::Client,
    provider: Provider,
    access_token: &str,
) -> anyhow::Result<SocialProfile> {
    let profile = match provider {
        Provider::Google => {
            let info: GoogleUserInfo = http
                .get("https://openidconnect.googleapis.com/v1/userinfo")
                .bearer_auth(access_token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .context("decode google userinfo")?;
            let email = info.email.context("google account has no email")?;
            SocialProfile {
                name: info.name.unwrap_or_else(|| email.clone()),
                account_id: info.sub,
                email,
                email_verified: info.email_verified,
                image: info.picture,
            }
        }
        Provider::Github => {
            let user: GithubUser = http
                .get("https://api.github.com/user")
                .bearer_auth(access_token)
                .header(reqwest::header::ACCEPT, "application/vnd.github+json")
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .context("decode github user")?;
            let emails: Vec<GithubEmail> = http
                .get("https://api.github.com/user/emails")
                .bearer_auth(access_token)
                .header(reqwest::header::ACCEPT, "application/vnd.github+json")
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .context("decode github emails")?;
            let (email, email_verified) = github_email(user.email, &emails)
                .context("github account has no usable email")?;
            SocialProfile {
                account_id: user.id.to_string(),
                name: user.name.filter(|n| !n.is_empty()).unwrap_or(user.login),
                email,
                email_verified,
                image: user.avatar_url,
            }
        }
    };
    debug!(provider = provider.id(), account_id = %profile.account_id, "provider profile fetched");
    Ok(profile)
}

/// Primary verified address wins; the public profile email is the fallback.
fn github_email(public: Option<String>, emails: &[GithubEmail]) -> Option<(String, bool)> {
    if let Some(e) = emails.iter().find(|e| e.primary && e.verified) {
        return Some((e.email.clone(), true));
    }
    if let Some(e) = emails.iter().find(|e| e.verified) {
        return Some((e.email.clone(), true));
    }
    public
        .filter(|e| !e.is_empty())
        .map(|e| {
            let verified = emails.iter().any(|x| x.email == e && x.verified);
            (e, verified)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        OAuthClient {
            client_id: "cid".into(),
            client_secret: "csecret".into(),
        }
    }

    #[test]
    fn parses_known_providers_only() {
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("github".parse::<Provider>().unwrap(), Provider::Github);
        assert!("microsoft".parse::<Provider>().is_err());
    }

    #[test]
    fn authorize_url_carries_state_and_redirect() {
        let redirect = callback_url("https://api.market.dev", Provider::Github);
        assert_eq!(redirect, "https://api.market.dev/api/v1/auth/social/github/callback");
        let url = authorize_url(Provider::Github, &client(), &redirect, "xyz").unwrap();
        assert!(url.as_str().starts_with("https://github.com/login/oauth/authorize?"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "cid".into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
        assert!(pairs.contains(&("redirect_uri".into(), redirect.clone())));
        assert!(!pairs.iter().any(|(k, _)| k == "client_secret"));
    }

    #[test]
    fn google_prompts_account_selection() {
        let url = authorize_url(Provider::Google, &client(), "http://cb", "s").unwrap();
        assert!(url.query_pairs().any(|(k, v)| k == "prompt" && v == "select_account"));
    }

    #[test]
    fn state_is_random_alphanumeric() {
        let a = random_state();
        let b = random_state();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn github_email_prefers_primary_verified() {
        let emails = vec![
            GithubEmail { email: "old@x.dev".into(), primary: false, verified: true },
            GithubEmail { email: "main@x.dev".into(), primary: true, verified: true },
        ];
        assert_eq!(
            github_email(Some("public@x.dev".into()), &emails),
            Some(("main@x.dev".into(), true))
        );
        assert_eq!(
            github_email(Some("public@x.dev".into()), &[]),
            Some(("public@x.dev".into(), false))
        );
        assert_eq!(github_email(None, &[]), None);
    }
}
