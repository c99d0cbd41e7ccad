/// Authorized-user token store with access-token refresh
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Result, SorterError};

/// Refresh this long before the recorded expiry
const EXPIRY_MARGIN_SECONDS: i64 = 60;

/// Credentials as written by the authorization flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    /// Current access token
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Access token expiry (RFC 3339)
    pub expiry: Option<String>,
    /// Fields we do not interpret (scopes, token_uri, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthorizedUser {
    /// Whether the access token is missing or about to expire
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        if self.token.as_deref().map_or(true, str::is_empty) {
            return true;
        }
        match self.expiry.as_deref().map(DateTime::parse_from_rfc3339) {
            Some(Ok(expiry)) => {
                expiry.with_timezone(&Utc) <= now + ChronoDuration::seconds(EXPIRY_MARGIN_SECONDS)
            }
            // No usable expiry: trust the token and let the API reject it.
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Hands out a valid access token, refreshing and persisting it when needed
pub struct TokenStore {
    path: PathBuf,
    token_url: String,
    client: reqwest::Client,
    credentials: Mutex<AuthorizedUser>,
}

impl TokenStore {
    /// Load credentials from the token file
    pub async fn load(path: &Path, token_url: &str, timeout_seconds: u64) -> Result<Self> {
        if !path.exists() {
            return Err(SorterError::Config(format!(
                "{} not found; run the authorization flow first",
                path.display()
            )));
        }

        let content = tokio::fs::read_to_string(path).await?;
        let credentials: AuthorizedUser = serde_json::from_str(&content).map_err(|e| {
            SorterError::Config(format!("invalid token file {}: {}", path.display(), e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| SorterError::Config(format!("cannot build HTTP client: {}", e)))?;

        debug!("Loaded credentials from {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            token_url: token_url.to_string(),
            client,
            credentials: Mutex::new(credentials),
        })
    }

    /// Current access token, refreshed first if it has expired
    pub async fn access_token(&self) -> Result<String> {
        let mut credentials = self.credentials.lock().await;

        if credentials.needs_refresh(Utc::now()) {
            self.refresh(&mut credentials).await?;
        }

        credentials
            .token
            .clone()
            .ok_or_else(|| SorterError::Auth("no access token available".to_string()))
    }

    async fn refresh(&self, credentials: &mut AuthorizedUser) -> Result<()> {
        let (refresh_token, client_id, client_secret) = match (
            credentials.refresh_token.as_deref(),
            credentials.client_id.as_deref(),
            credentials.client_secret.as_deref(),
        ) {
            (Some(r), Some(id), Some(secret)) => (r.to_string(), id.to_string(), secret.to_string()),
            _ => {
                return Err(SorterError::Auth(
                    "access token expired and no refresh credentials are stored".to_string(),
                ))
            }
        };

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
        ];

        let response = self.client.post(&self.token_url).form(&params).send().await?;
        let status = response.status();
        if status.is_client_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(SorterError::Auth(format!("token refresh rejected ({}): {}", status, text)));
        }
        if !status.is_success() {
            return Err(SorterError::TransientApi(format!("token refresh failed: {}", status)));
        }

        let refreshed: RefreshResponse = response.json().await?;
        let expires_in = refreshed.expires_in.unwrap_or(3600);
        credentials.token = Some(refreshed.access_token);
        credentials.expiry = Some((Utc::now() + ChronoDuration::seconds(expires_in)).to_rfc3339());

        write_credentials(&self.path, credentials)?;
        info!("🔑 Refreshed access token, saved to {}", self.path.display());

        Ok(())
    }
}

/// Atomically replace the token file
fn write_credentials(path: &Path, credentials: &AuthorizedUser) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(serde_json::to_string_pretty(credentials)?.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SorterError::Io(e.error))?;
    Ok(())
}
