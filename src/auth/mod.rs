//! Service-account credentials for the directory API.
//!
//! Exchanges a signed JWT assertion for an OAuth2 access token, impersonating
//! the configured admin subject. Tokens are cached until shortly before expiry,
//! and callers that find the cache stale share a single in-flight exchange.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{watch, Mutex};

/// Scope for managing groups.
pub const DIRECTORY_GROUP_SCOPE: &str = "https://www.googleapis.com/auth/admin.directory.group";
/// Scope for managing group memberships.
pub const DIRECTORY_GROUP_MEMBER_SCOPE: &str =
    "https://www.googleapis.com/auth/admin.directory.group.member";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// Errors raised while loading credentials or fetching tokens.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("failed to read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid service account key: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid private key: {0}")]
    Key(jsonwebtoken::errors::Error),
    #[error("failed to sign assertion: {0}")]
    Sign(jsonwebtoken::errors::Error),
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token exchange rejected: {0}")]
    Exchange(String),
    #[error("{0}")]
    Refresh(String),
}

/// Something that can hand out bearer tokens for upstream calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String, CredentialsError>;
}

/// The fields of a service-account JSON key that the JWT flow needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Outcome of a refresh, shared with every caller waiting on it.
type RefreshOutcome = Option<Result<String, String>>;

#[derive(Default)]
struct TokenState {
    cached: Option<CachedToken>,
    refresh: Option<watch::Receiver<RefreshOutcome>>,
}

/// Token source backed by a service account with domain-wide delegation.
pub struct ServiceAccountTokenSource {
    exchange: Arc<TokenExchange>,
}

struct TokenExchange {
    http: reqwest::Client,
    client_email: String,
    key_id: Option<String>,
    token_uri: String,
    subject: String,
    scopes: String,
    encoding_key: EncodingKey,
    state: Mutex<TokenState>,
}

impl ServiceAccountTokenSource {
    /// Load a service-account key file and prepare to impersonate `subject`.
    pub fn from_file(
        path: &Path,
        subject: &str,
        http: reqwest::Client,
    ) -> Result<Self, CredentialsError> {
        let data = std::fs::read(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let key: ServiceAccountKey = serde_json::from_slice(&data)?;
        Self::from_key(key, subject, http)
    }

    pub fn from_key(
        key: ServiceAccountKey,
        subject: &str,
        http: reqwest::Client,
    ) -> Result<Self, CredentialsError> {
        let encoding_key =
            EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(CredentialsError::Key)?;

        Ok(Self {
            exchange: Arc::new(TokenExchange {
                http,
                client_email: key.client_email,
                key_id: key.private_key_id,
                token_uri: key.token_uri,
                subject: subject.to_string(),
                scopes: [DIRECTORY_GROUP_SCOPE, DIRECTORY_GROUP_MEMBER_SCOPE].join(" "),
                encoding_key,
                state: Mutex::new(TokenState::default()),
            }),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.exchange.client_email
    }
}

impl TokenExchange {
    fn assertion(&self, now: DateTime<Utc>) -> Result<String, CredentialsError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: self.client_email.clone(),
            sub: self.subject.clone(),
            scope: self.scopes.clone(),
            aud: self.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(CredentialsError::Sign)
    }

    async fn fetch(&self) -> Result<CachedToken, CredentialsError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        tracing::debug!("Requesting access token for {}", self.subject);
        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialsError::Exchange(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        let expires_at = Duration::try_seconds(lifetime)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                CredentialsError::Exchange(format!(
                    "token endpoint returned out of range expires_in {}",
                    lifetime
                ))
            })?;

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }

    /// Run one exchange, store the result and wake every waiting caller.
    async fn refresh(self: Arc<Self>, outcome: watch::Sender<RefreshOutcome>) {
        let result = self.fetch().await;

        let mut state = self.state.lock().await;
        state.refresh = None;
        let shared = match result {
            Ok(token) => {
                let access_token = token.access_token.clone();
                state.cached = Some(token);
                Ok(access_token)
            }
            Err(e) => {
                tracing::warn!("Access token refresh failed: {}", e);
                Err(e.to_string())
            }
        };
        drop(state);

        outcome.send_replace(Some(shared));
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn token(&self) -> Result<String, CredentialsError> {
        // The lock only guards the cache. The exchange runs on its own task and
        // survives a cancelled caller.
        let mut outcome = {
            let mut state = self.exchange.state.lock().await;

            if let Some(token) = state.cached.as_ref() {
                if token.is_fresh(Utc::now()) {
                    return Ok(token.access_token.clone());
                }
            }

            match state.refresh.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    state.refresh = Some(receiver.clone());
                    tokio::spawn(Arc::clone(&self.exchange).refresh(sender));
                    receiver
                }
            }
        };

        let shared = outcome
            .wait_for(Option::is_some)
            .await
            .map(|value| value.clone())
            .map_err(|_| CredentialsError::Refresh("token refresh was abandoned".to_string()))?;

        match shared {
            Some(Ok(access_token)) => Ok(access_token),
            Some(Err(message)) => Err(CredentialsError::Refresh(message)),
            None => Err(CredentialsError::Refresh("token refresh was abandoned".to_string())),
        }
    }
}

/// Fixed token, for tests.
#[cfg(test)]
pub struct StaticTokenSource(pub String);

#[cfg(test)]
#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<String, CredentialsError> {
        Ok(self.0.clone())
    }
}
