use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use services::services::sms::SmsDispatch;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// Relay an SMS payload (single assignment notice or bulk message) to the
/// dispatch function.
pub async fn send_sms(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<SmsDispatch>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let client = state
        .sms()
        .ok_or(ApiError::ServiceUnavailable("sms dispatch"))?;
    client.send(&payload).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/notifications/sms", post(send_sms))
}
