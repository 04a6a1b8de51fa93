use payment_model::Cell;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::auth::{ServiceAccount, TokenSource};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("invalid service account credentials: {0}")]
    Credentials(#[source] serde_json::Error),
    #[error("cannot sign token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with status={status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid spreadsheet address '{0}'")]
    Address(String),
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads whole sheets as cell grids through the Sheets values API.
pub struct SheetsClient {
    http: reqwest::Client,
    tokens: TokenSource,
}

impl SheetsClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            tokens: TokenSource::new(http.clone()),
            http,
        }
    }

    pub async fn fetch_rows(
        &self,
        credentials: &str,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<Vec<Vec<Cell>>, SheetsError> {
        let account = ServiceAccount::from_json(credentials)?;
        let token = self.tokens.access_token(&account).await?;
        let url = values_url(spreadsheet_id, sheet_name)?;
        debug!(%url, "fetching sheet values");

        let response = self.http.get(url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let range: ValueRange = response.json().await?;
        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(to_cell).collect())
            .collect())
    }
}

fn values_url(spreadsheet_id: &str, sheet_name: &str) -> Result<Url, SheetsError> {
    let mut url = Url::parse(SHEETS_API).map_err(|_| SheetsError::Address(SHEETS_API.into()))?;
    url.path_segments_mut()
        .map_err(|_| SheetsError::Address(spreadsheet_id.to_string()))?
        .push(spreadsheet_id)
        .push("values")
        .push(sheet_name);
    Ok(url)
}

fn to_cell(value: &Value) -> Cell {
    match value {
        Value::String(text) => Cell::text(text.as_str()),
        Value::Null => Cell::Empty,
        Value::Bool(_) => Cell::Unsupported("bool".into()),
        Value::Number(_) => Cell::Unsupported("number".into()),
        Value::Array(_) => Cell::Unsupported("array".into()),
        Value::Object(_) => Cell::Unsupported("object".into()),
    }
}
