//! Client for the SMS dispatch function.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Clone, Error)]
pub enum SmsError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("sms function timed out")]
    Timeout,
    #[error("sms function returned http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("sms gateway rejected the message: {0}")]
    Gateway(String),
    #[error("invalid response from sms function: {0}")]
    Serde(String),
}

/// The two payload shapes the function accepts: a room-assignment notice for
/// one recipient, or a free-form message to many.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(untagged)]
pub enum SmsDispatch {
    Assignment {
        to: String,
        name: String,
        #[serde(rename = "roomName")]
        room_name: String,
        #[serde(rename = "roomType")]
        room_type: String,
    },
    Bulk { to: Vec<String>, message: String },
}

#[derive(Debug, Deserialize)]
struct SmsResult {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmsClient {
    http: Client,
    url: String,
}

impl SmsClient {
    // Mirrors the function's own 8 second gateway timeout.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

    pub fn new(url: String) -> Result<Self, SmsError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("roomalloc/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SmsError::Transport(e.to_string()))?;
        Ok(Self { http, url })
    }

    pub async fn send(&self, dispatch: &SmsDispatch) -> Result<(), SmsError> {
        let res = self
            .http
            .post(&self.url)
            .json(dispatch)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => {
                let result = res
                    .json::<SmsResult>()
                    .await
                    .map_err(|e| SmsError::Serde(e.to_string()))?;
                if result.success {
                    Ok(())
                } else {
                    Err(SmsError::Gateway(
                        result.error.unwrap_or_else(|| "unknown error".to_string()),
                    ))
                }
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Err(SmsError::Timeout),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(SmsError::Http { status, body })
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> SmsError {
    if e.is_timeout() {
        SmsError::Timeout
    } else {
        SmsError::Transport(e.to_string())
    }
}
