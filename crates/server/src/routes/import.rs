use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use axum::extract::Multipart;
use services::services::import::ImportSummary;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// Forward an uploaded workbook to the Excel import function. The function
/// owns the parsing and LLM row normalization; we only relay the file and an
/// optional per-request API key.
pub async fn import_excel(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<ImportSummary>>, ApiError> {
    let client = state
        .import()
        .ok_or(ApiError::ServiceUnavailable("excel import"))?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut api_key_override: Option<String> = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload.xlsx").to_string();
                let bytes = field.bytes().await?.to_vec();
                file = Some((file_name, bytes));
            }
            Some("api_key") => {
                api_key_override = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("missing 'file' field".to_string()))?;
    let summary = client.import(file_name, bytes, api_key_override).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/import/excel", post(import_excel))
}
