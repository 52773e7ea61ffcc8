//! Third-party identity federation.
//!
//! Every provider reduces to the same contract: send the browser to an
//! authorization page, then turn the returned `code` into a verified email.
//! Account linking and token issuance stay provider-agnostic.

use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::config::{OAuthClient, OAuthConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub email: String,
    pub name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn authorize_url(&self, state: &str) -> anyhow::Result<String>;

    async fn authenticate(&self, code: &str) -> anyhow::Result<ExternalIdentity>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Endpoints of an OAuth2 authorization-code provider.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub authorize: String,
    pub token: String,
    pub profile: String,
}

struct OAuthApp {
    http: Client,
    client: OAuthClient,
    redirect_uri: String,
    endpoints: Endpoints,
}

impl OAuthApp {
    fn new(client: OAuthClient, redirect_uri: String, endpoints: Endpoints) -> Self {
        Self {
            http: Client::new(),
            client,
            redirect_uri,
            endpoints,
        }
    }

    fn authorize_url(&self, scope: &str, state: &str) -> anyhow::Result<String> {
        let url = Url::parse_with_params(
            &self.endpoints.authorize,
            &[
                ("client_id", self.client.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<String> {
        let token: TokenResponse = self
            .http
            .post(&self.endpoints.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("code", code),
                ("client_id", self.client.client_id.as_str()),
                ("client_secret", self.client.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("token exchange request")?
            .error_for_status()
            .context("token exchange rejected")?
            .json()
            .await
            .context("token exchange payload")?;
        Ok(token.access_token)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str, token: &str) -> anyhow::Result<T> {
        let value = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, "recipegen")
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("GET {}", url))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("decode {}", url))?;
        Ok(value)
    }
}

pub struct GoogleProvider {
    app: OAuthApp,
}

impl GoogleProvider {
    pub fn endpoints() -> Endpoints {
        Endpoints {
            authorize: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token: "https://oauth2.googleapis.com/token".into(),
            profile: "https://openidconnect.googleapis.com/v1/userinfo".into(),
        }
    }

    pub fn new(client: OAuthClient, redirect_uri: String, endpoints: Endpoints) -> Self {
        Self {
            app: OAuthApp::new(client, redirect_uri, endpoints),
        }
    }
}

#[derive(Deserialize)]
struct GoogleProfile {
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    name: Option<String>,
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        self.app.authorize_url("openid email profile", state)
    }

    async fn authenticate(&self, code: &str) -> anyhow::Result<ExternalIdentity> {
        let token = self.app.exchange_code(code).await?;
        let profile: GoogleProfile = self.app.get_json(&self.app.endpoints.profile, &token).await?;
        anyhow::ensure!(profile.email_verified != Some(false), "google email not verified");
        Ok(ExternalIdentity {
            email: profile.email.context("google profile has no email")?,
            name: profile.name,
        })
    }
}

pub struct GitHubProvider {
    app: OAuthApp,
}

impl GitHubProvider {
    pub fn endpoints() -> Endpoints {
        Endpoints {
            authorize: "https://github.com/login/oauth/authorize".into(),
            token: "https://github.com/login/oauth/access_token".into(),
            profile: "https://api.github.com/user".into(),
        }
    }

    pub fn new(client: OAuthClient, redirect_uri: String, endpoints: Endpoints) -> Self {
        Self {
            app: OAuthApp::new(client, redirect_uri, endpoints),
        }
    }
}

#[derive(Deserialize)]
struct GitHubProfile {
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        self.app.authorize_url("user:email", state)
    }

    async fn authenticate(&self, code: &str) -> anyhow::Result<ExternalIdentity> {
        let token = self.app.exchange_code(code).await?;
        let profile: GitHubProfile = self.app.get_json(&self.app.endpoints.profile, &token).await?;

        // Private emails are only listed on the emails endpoint.
        let email = match profile.email {
            Some(email) => email,
            None => {
                let emails: Vec<GitHubEmail> = self
                    .app
                    .get_json(&format!("{}/emails", self.app.endpoints.profile), &token)
                    .await?;
                emails
                    .into_iter()
                    .filter(|e| e.verified)
                    .max_by_key(|e| e.primary)
                    .map(|e| e.email)
                    .context("github account has no verified email")?
            }
        };

        Ok(ExternalIdentity {
            email,
            name: profile.name.or(Some(profile.login)),
        })
    }
}

/// Configured providers, keyed by their route segment.
#[derive(Clone, Default)]
pub struct IdentityProviders {
    by_name: HashMap<&'static str, Arc<dyn IdentityProvider>>,
}

impl IdentityProviders {
    pub fn from_config(cfg: &OAuthConfig) -> Self {
        let base = cfg.public_url.trim_end_matches('/');
        let mut providers = Self::default();
        if let Some(client) = cfg.google.clone() {
            providers.insert(Arc::new(GoogleProvider::new(
                client,
                format!("{}/api/auth/google/callback", base),
                GoogleProvider::endpoints(),
            )));
        }
        if let Some(client) = cfg.github.clone() {
            providers.insert(Arc::new(GitHubProvider::new(
                client,
                format!("{}/api/auth/github/callback", base),
                GitHubProvider::endpoints(),
            )));
        }
        providers
    }

    pub fn insert(&mut self, provider: Arc<dyn IdentityProvider>) {
        self.by_name.insert(provider.name(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.by_name.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
