//! Client for the Excel import function. The function parses the uploaded
//! workbook, normalizes rows through an LLM completion API (with a
//! field-name-matching fallback) and reports how many rows it processed. All
//! of that happens server-side; this client only speaks its HTTP contract.

use std::time::Duration;

use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Clone, Error)]
pub enum ImportError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("import function timed out")]
    Timeout,
    #[error("import function returned http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid response from import function: {0}")]
    Serde(String),
}

/// Result of an import run as reported by the function.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ImportSummary {
    pub processed: u32,
    pub failed: u32,
}

#[derive(Debug, Clone)]
pub struct ExcelImportClient {
    http: Client,
    url: String,
    api_key: Option<String>,
}

impl ExcelImportClient {
    // Workbook parsing plus LLM normalization can take a while.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(url: String, api_key: Option<String>) -> Result<Self, ImportError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("roomalloc/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ImportError::Transport(e.to_string()))?;
        Ok(Self { http, url, api_key })
    }

    /// Upload a workbook. `api_key_override` takes precedence over the
    /// configured key for this one request.
    pub async fn import(
        &self,
        file_name: String,
        bytes: Vec<u8>,
        api_key_override: Option<String>,
    ) -> Result<ImportSummary, ImportError> {
        let mut form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        if let Some(key) = api_key_override.or_else(|| self.api_key.clone()) {
            form = form.text("api_key", key);
        }

        let res = self
            .http
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<ImportSummary>()
                .await
                .map_err(|e| ImportError::Serde(e.to_string())),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(ImportError::Http { status, body })
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ImportError {
    if e.is_timeout() {
        ImportError::Timeout
    } else {
        ImportError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_deserializes_from_function_response() {
        let summary: ImportSummary =
            serde_json::from_str(r#"{"processed": 42, "failed": 3}"#).unwrap();
        assert_eq!(summary.processed, 42);
        assert_eq!(summary.failed, 3);
    }

    #[test]
    fn http_error_display_carries_status_and_body() {
        let err = ImportError::Http {
            status: 500,
            body: "parse failure".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "import function returned http 500: parse failure"
        );
    }
}
