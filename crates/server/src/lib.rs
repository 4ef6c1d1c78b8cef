pub mod error;
pub mod routes;

use std::sync::Arc;

use db::DBService;
use services::services::{config::Config, import::ExcelImportClient, sms::SmsClient};

#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<Config>,
    import: Option<ExcelImportClient>,
    sms: Option<SmsClient>,
}

impl AppState {
    /// Wire up the shared state; function clients are only constructed for
    /// endpoints with a configured URL.
    pub fn new(db: DBService, config: Config) -> anyhow::Result<Self> {
        let import = config
            .excel_import_url
            .clone()
            .map(|url| ExcelImportClient::new(url, config.excel_import_api_key.clone()))
            .transpose()?;
        let sms = config
            .sms_function_url
            .clone()
            .map(SmsClient::new)
            .transpose()?;
        Ok(Self {
            db,
            config: Arc::new(config),
            import,
            sms,
        })
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn import(&self) -> Option<&ExcelImportClient> {
        self.import.as_ref()
    }

    pub fn sms(&self) -> Option<&SmsClient> {
        self.sms.as_ref()
    }
}
