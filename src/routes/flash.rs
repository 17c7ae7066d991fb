use axum::{Json, Router, routing::get};
use tower_sessions::Session;

use crate::{
    error::AppResult,
    flash::{self, Flash},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(take_flash))
}

#[utoipa::path(
    get,
    path = "/api/flash",
    responses(
        (status = 200, description = "Pending notifications; cleared once read", body = ApiResponse<Vec<Flash>>),
    ),
    tag = "Flash"
)]
pub async fn take_flash(session: Session) -> AppResult<Json<ApiResponse<Vec<Flash>>>> {
    let messages = flash::take(&session).await?;
    Ok(Json(ApiResponse::success(
        "OK",
        messages,
        Some(Meta::empty()),
    )))
}
