use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::{
    dto::auth::{
        LoginRequest, LoginResponse, OtpDispatch, RegisterRequest, RequestOtpRequest,
        VerifyOtpRequest,
    },
    error::AppResult,
    models::User,
    response::ApiResponse,
    services::auth_service::{login_user, register_user, request_otp, verify_otp},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/otp/request", post(resend_otp))
        .route("/otp/verify", post(confirm_otp))
        .route("/login", post(login))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification code sent", body = ApiResponse<User>),
        (status = 400, description = "Invalid registration data"),
        (status = 409, description = "Email already registered"),
        (status = 502, description = "Verification email could not be sent"),
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let resp = register_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/otp/request",
    request_body = RequestOtpRequest,
    responses(
        (status = 200, description = "Code sent, or account already verified", body = ApiResponse<OtpDispatch>),
        (status = 404, description = "No account for this email"),
    ),
    tag = "Auth"
)]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<RequestOtpRequest>,
) -> AppResult<Json<ApiResponse<OtpDispatch>>> {
    let resp = request_otp(&state, &payload.email).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/otp/verify",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account verified", body = ApiResponse<User>),
        (status = 400, description = "Code expired or does not match"),
    ),
    tag = "Auth"
)]
pub async fn confirm_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = verify_otp(&state, &payload.email, &payload.code).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login user", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Email not verified"),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = login_user(&state, payload).await?;
    Ok(Json(resp))
}
