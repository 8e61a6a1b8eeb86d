use chrono::{DateTime, Datelike, Duration, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::IntoUrl;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::Error;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Client identity from a Google client-secret file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientConfig>,
    web: Option<ClientConfig>,
}

/// Cached OAuth token as kept in `token.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// A token with no expiry, or the zero-time placeholder, never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) if expiry.year() > 1 => expiry <= now + Duration::seconds(60),
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expires_in: i64,
    refresh_token: Option<String>,
}

/// Source of bearer tokens for the photo service.
pub trait TokenProvider {
    fn access_token(&mut self) -> Result<String, Error>;
}

/// Reads the client secret and cached token from disk, refreshing and
/// re-saving the token when it has expired.
pub struct StoredTokenProvider {
    client: ClientConfig,
    token_path: PathBuf,
    token: StoredToken,
    http: Client,
}

impl StoredTokenProvider {
    pub fn load(credentials_path: &Path, token_path: &Path) -> Result<Self, Error> {
        let client = read_client_config(credentials_path)?;
        let token = read_token(token_path)?;
        let http = Client::builder()
            .build()
            .map_err(|e| Error::Auth(format!("unable to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            token_path: token_path.to_path_buf(),
            token,
            http,
        })
    }

    fn refresh(&mut self) -> Result<(), Error> {
        let refresh_token = self.token.refresh_token.clone().ok_or_else(|| {
            Error::Auth(format!(
                "token in {} has expired and carries no refresh token",
                self.token_path.display()
            ))
        })?;

        info!("Refreshing access token");
        let response = self
            .http
            .post(&self.client.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", self.client.client_id.as_str()),
                ("client_secret", self.client.client_secret.as_str()),
            ])
            .send()
            .map_err(|e| Error::Auth(format!("token refresh failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Auth(format!("token refresh rejected ({}): {}", status, body)));
        }

        let refreshed: RefreshResponse = response
            .json()
            .map_err(|e| Error::Auth(format!("unreadable token refresh response: {}", e)))?;

        self.token = StoredToken {
            access_token: refreshed.access_token,
            token_type: refreshed.token_type,
            refresh_token: refreshed.refresh_token.or(Some(refresh_token)),
            expiry: (refreshed.expires_in > 0)
                .then(|| Utc::now() + Duration::seconds(refreshed.expires_in)),
        };
        save_token(&self.token_path, &self.token)
    }
}

impl TokenProvider for StoredTokenProvider {
    fn access_token(&mut self) -> Result<String, Error> {
        if self.token.is_expired(Utc::now()) {
            self.refresh()?;
        }
        Ok(self.token.access_token.clone())
    }
}

/// HTTP client that asks its token provider for a bearer token on every
/// request, so a token that expires mid-run is refreshed before the next call.
pub struct AuthenticatedTransport {
    client: Client,
    tokens: Box<dyn TokenProvider>,
}

impl AuthenticatedTransport {
    pub fn new(client: Client, tokens: Box<dyn TokenProvider>) -> Self {
        Self { client, tokens }
    }

    /// Start a POST to `url` carrying a currently valid bearer token.
    pub fn post<U: IntoUrl>(&mut self, url: U) -> Result<RequestBuilder, Error> {
        let token = self.tokens.access_token()?;
        Ok(self.client.post(url).bearer_auth(token))
    }
}

/// Build the transport used for real uploads.
///
/// The token is fetched once up front so missing or unrefreshable
/// credentials fail before the walk starts.
pub fn authenticated_transport(config: &AppConfig) -> Result<AuthenticatedTransport, Error> {
    let mut provider = StoredTokenProvider::load(&config.credentials_path, &config.token_path)?;
    provider.access_token()?;
    let client = Client::builder()
        .build()
        .map_err(|e| Error::Auth(format!("unable to build HTTP client: {}", e)))?;
    Ok(AuthenticatedTransport::new(client, Box::new(provider)))
}

pub fn read_client_config(path: &Path) -> Result<ClientConfig, Error> {
    let raw = fs::read_to_string(path).map_err(|e| {
        Error::Auth(format!("unable to read client secret file {}: {}", path.display(), e))
    })?;
    let file: ClientSecretFile = serde_json::from_str(&raw).map_err(|e| {
        Error::Auth(format!("unable to parse client secret file {}: {}", path.display(), e))
    })?;
    file.installed.or(file.web).ok_or_else(|| {
        Error::Auth(format!(
            "client secret file {} has neither an \"installed\" nor a \"web\" section",
            path.display()
        ))
    })
}

pub fn read_token(path: &Path) -> Result<StoredToken, Error> {
    let raw = fs::read_to_string(path).map_err(|e| {
        Error::Auth(format!(
            "no cached token at {} ({}); authorize once and save the token there",
            path.display(),
            e
        ))
    })?;
    let token: StoredToken = serde_json::from_str(&raw)?;
    debug!("Loaded cached token from {}", path.display());
    Ok(token)
}

pub fn save_token(path: &Path, token: &StoredToken) -> Result<(), Error> {
    info!("Saving credential file to: {}", path.display());
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    serde_json::to_writer(&mut file, token)?;
    if let Err(e) = file.write_all(b"\n") {
        warn!("Unable to terminate token file {}: {}", path.display(), e);
    }
    Ok(())
}
