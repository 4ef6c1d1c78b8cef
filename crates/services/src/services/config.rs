//! Process configuration, read once from the environment at startup.

use tracing::warn;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://roomalloc.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Endpoint of the Excel import function. Unset disables the import API.
    pub excel_import_url: Option<String>,
    /// Optional LLM API key forwarded to the import function.
    pub excel_import_api_key: Option<String>,
    /// Endpoint of the SMS dispatch function. Unset disables the SMS API.
    pub sms_function_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let port = match std::env::var("ROOMALLOC_PORT") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(%raw, "invalid ROOMALLOC_PORT, falling back to default");
                DEFAULT_PORT
            }),
            Err(_) => DEFAULT_PORT,
        };
        Self {
            port,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            excel_import_url: env_nonempty("EXCEL_IMPORT_URL"),
            excel_import_api_key: env_nonempty("EXCEL_IMPORT_API_KEY"),
            sms_function_url: env_nonempty("SMS_FUNCTION_URL"),
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
