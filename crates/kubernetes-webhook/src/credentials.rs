//! Access tokens for the Google Cloud APIs.
//!
//! A service-account JSON key is exchanged for a short-lived OAuth access
//! token using a signed JWT assertion. Tokens are cached until shortly
//! before they expire.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::CredentialsError;

/// OAuth scopes requested for the container and compute APIs.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/compute.readonly",
    "https://www.googleapis.com/auth/cloud-platform",
];

const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each JWT assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Source of bearer tokens for outbound API calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a currently valid access token.
    async fn token(&self) -> Result<String, CredentialsError>;
}

/// Fixed token, for local development and tests.
#[derive(Debug, Clone)]
pub struct StaticTokenSource(String);

impl StaticTokenSource {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<String, CredentialsError> {
        Ok(self.0.clone())
    }
}

/// Fields of a service-account key file this crate uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

const fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// [`TokenSource`] backed by a service-account key.
pub struct ServiceAccountTokenSource {
    client: Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    /// Load a service-account key file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&contents)?;
        info!(client_email = %key.client_email, "Loaded service account key");
        Self::new(key)
    }

    /// Build a token source from a parsed key.
    pub fn new(key: ServiceAccountKey) -> Result<Self, CredentialsError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| CredentialsError::Exchange(e.to_string()))?;

        Ok(Self {
            client,
            key,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, CredentialsError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES.join(" "),
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.key.private_key_id);
        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken, CredentialsError> {
        let assertion = self.assertion(now)?;
        debug!(token_uri = %self.key.token_uri, "Exchanging service account assertion");

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| CredentialsError::Exchange(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CredentialsError::Exchange(e.to_string()))?;
        if !status.is_success() {
            return Err(CredentialsError::Exchange(format!("{status}: {text}")));
        }

        let token: TokenResponse = serde_json::from_str(&text)?;
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + chrono::Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn token(&self) -> Result<String, CredentialsError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - chrono::Duration::seconds(EXPIRY_MARGIN_SECS) > now {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.exchange(now).await?;
        debug!(expires_at = %fresh.expires_at, "Obtained access token");
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY: &str = include_str!("../tests/fixtures/test-service-account-key.pem");

    fn key(token_uri: String) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "webhook@my-project.iam.gserviceaccount.com".to_string(),
            private_key: TEST_KEY.to_string(),
            private_key_id: Some("abc123".to_string()),
            token_uri,
        }
    }

    #[tokio::test]
    async fn test_static_token() {
        let source = StaticTokenSource::new("ya29.static");
        assert_eq!(source.token().await.unwrap(), "ya29.static");
    }

    #[tokio::test]
    async fn test_exchange_and_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
            .and(body_string_contains("assertion="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = ServiceAccountTokenSource::new(key(format!("{}/token", server.uri()))).unwrap();
        assert_eq!(source.token().await.unwrap(), "ya29.fresh");
        // Second call is served from the cache.
        assert_eq!(source.token().await.unwrap(), "ya29.fresh");
    }

    #[tokio::test]
    async fn test_exchange_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let source = ServiceAccountTokenSource::new(key(format!("{}/token", server.uri()))).unwrap();
        let err = source.token().await.unwrap_err();
        assert!(matches!(err, CredentialsError::Exchange(ref m) if m.contains("invalid_grant")));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::json!({
            "type": "service_account",
            "project_id": "my-project",
            "private_key_id": "abc123",
            "private_key": TEST_KEY,
            "client_email": "webhook@my-project.iam.gserviceaccount.com"
        });
        write!(file, "{json}").unwrap();

        let source = ServiceAccountTokenSource::from_file(file.path()).unwrap();
        assert_eq!(source.key.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn test_from_missing_file() {
        let result = ServiceAccountTokenSource::from_file("/nonexistent/service-account.json");
        assert!(matches!(result, Err(CredentialsError::Read { .. })));
    }

    #[test]
    fn test_invalid_private_key() {
        let mut bad = key("https://oauth2.googleapis.com/token".to_string());
        bad.private_key = "not a pem".to_string();
        assert!(matches!(
            ServiceAccountTokenSource::new(bad),
            Err(CredentialsError::Sign(_))
        ));
    }
}
