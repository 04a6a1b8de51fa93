//! Service-account access tokens for the Sheets API (OAuth2 JWT bearer grant).

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::sheets::SheetsError;

const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
// refresh a little before Google expires the token
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccount {
    pub fn from_json(credentials: &str) -> Result<Self, SheetsError> {
        serde_json::from_str(credentials).map_err(SheetsError::Credentials)
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
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
    client_email: String,
    access_token: String,
    expires_at: chrono::DateTime<Utc>,
}

/// Exchanges signed assertions for access tokens and keeps the last one.
pub struct TokenSource {
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self, account: &ServiceAccount) -> Result<String, SheetsError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.client_email == account.client_email && token.expires_at > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let assertion = sign_assertion(account)?;
        let response = self
            .http
            .post(&account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let token: TokenResponse = response.json().await?;
        let lifetime = token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS) - EXPIRY_MARGIN_SECS;
        *cached = Some(CachedToken {
            client_email: account.client_email.clone(),
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(lifetime.max(0)),
        });
        Ok(token.access_token)
    }
}

fn sign_assertion(account: &ServiceAccount) -> Result<String, SheetsError> {
    let iat = Utc::now().timestamp();
    let claims = Claims {
        iss: &account.client_email,
        scope: SHEETS_READONLY_SCOPE,
        aud: &account.token_uri,
        iat,
        exp: iat + TOKEN_LIFETIME_SECS,
    };
    let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())?;
    Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?)
}
