mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::ConnectionTrait;
use supermarket_api::{
    config::CartBackend,
    dto::auth::{LoginRequest, OtpDispatch, RegisterRequest},
    error::AppError,
    services::auth_service,
};

use common::{FailingMailer, RecordingMailer, setup_state_with, test_config};

const EMAIL: &str = "alice@example.com";

fn form() -> RegisterRequest {
    RegisterRequest {
        username: "alice".into(),
        email: EMAIL.into(),
        password: "secret1".into(),
        address: "1 Market St".into(),
        contact: "91234567".into(),
    }
}

fn login(password: &str) -> LoginRequest {
    LoginRequest {
        email: EMAIL.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn register_verify_then_login() -> anyhow::Result<()> {
    let mailer = Arc::new(RecordingMailer::default());
    let state = setup_state_with(test_config(CartBackend::Session), mailer.clone()).await?;

    let registered = auth_service::register_user(&state, form()).await?;
    let user = registered.data.expect("user");
    assert!(!user.verified);
    assert_eq!(user.role, "user");
    assert_eq!(mailer.count_for(EMAIL), 1);

    let refused = auth_service::login_user(&state, login("secret1")).await;
    assert!(matches!(refused, Err(AppError::NotVerified)));

    let code = state.otp.peek(EMAIL).await.expect("code issued").code;
    assert_eq!(code.len(), 6);

    let wrong = if code == "111111" { "222222" } else { "111111" };
    let mismatch = auth_service::verify_otp(&state, EMAIL, wrong).await;
    assert!(matches!(mismatch, Err(AppError::OtpMismatch)));

    let verified = auth_service::verify_otp(&state, EMAIL, &code).await?;
    assert!(verified.data.expect("user").verified);

    let replay = auth_service::verify_otp(&state, EMAIL, &code).await;
    assert!(matches!(replay, Err(AppError::OtpExpired)));

    let bad_password = auth_service::login_user(&state, login("wrong-password")).await;
    assert!(matches!(bad_password, Err(AppError::InvalidCredentials)));

    let session = auth_service::login_user(&state, login("secret1")).await?;
    let token = session.data.expect("login").token;
    let bearer = token.strip_prefix("Bearer ").expect("bearer prefix");
    assert_eq!(state.jwt.verify(bearer)?.user_id, user.id);

    let resend = auth_service::request_otp(&state, EMAIL).await?;
    assert_eq!(resend.data, Some(OtpDispatch::AlreadyVerified));
    assert_eq!(mailer.count_for(EMAIL), 1);
    Ok(())
}

#[tokio::test]
async fn expired_code_is_rejected() -> anyhow::Result<()> {
    let state = setup_state_with(
        test_config(CartBackend::Session),
        Arc::new(RecordingMailer::default()),
    )
    .await?;
    auth_service::register_user(&state, form()).await?;

    state
        .otp
        .store_at(EMAIL, "123456", Utc::now() - Duration::minutes(4))
        .await;

    let result = auth_service::verify_otp(&state, EMAIL, "123456").await;
    assert!(matches!(result, Err(AppError::OtpExpired)));

    let still_blocked = auth_service::login_user(&state, login("secret1")).await;
    assert!(matches!(still_blocked, Err(AppError::NotVerified)));
    Ok(())
}

#[tokio::test]
async fn requesting_a_new_code_replaces_the_old_one() -> anyhow::Result<()> {
    let mailer = Arc::new(RecordingMailer::default());
    let state = setup_state_with(test_config(CartBackend::Session), mailer.clone()).await?;
    auth_service::register_user(&state, form()).await?;

    state.otp.store_at(EMAIL, "123456", Utc::now()).await;
    let resp = auth_service::request_otp(&state, EMAIL).await?;
    assert_eq!(resp.data, Some(OtpDispatch::Sent));
    assert_eq!(mailer.count_for(EMAIL), 2);

    let fresh = state.otp.peek(EMAIL).await.expect("code issued").code;
    if fresh != "123456" {
        let stale = auth_service::verify_otp(&state, EMAIL, "123456").await;
        assert!(matches!(stale, Err(AppError::OtpMismatch)));
    }
    auth_service::verify_otp(&state, EMAIL, &fresh).await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_rejected() -> anyhow::Result<()> {
    let state = setup_state_with(
        test_config(CartBackend::Session),
        Arc::new(RecordingMailer::default()),
    )
    .await?;
    auth_service::register_user(&state, form()).await?;

    let again = auth_service::register_user(
        &state,
        RegisterRequest {
            email: "  ALICE@example.com ".into(),
            username: "alice2".into(),
            ..form()
        },
    )
    .await;
    assert!(matches!(again, Err(AppError::EmailTaken)));
    Ok(())
}

#[tokio::test]
async fn invalid_registration_creates_nothing() -> anyhow::Result<()> {
    let state = setup_state_with(
        test_config(CartBackend::Session),
        Arc::new(RecordingMailer::default()),
    )
    .await?;

    let result = auth_service::register_user(
        &state,
        RegisterRequest {
            contact: "1234".into(),
            ..form()
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let unknown = auth_service::request_otp(&state, EMAIL).await;
    assert!(matches!(unknown, Err(AppError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn dispatch_failure_surfaces_and_leaves_no_usable_code() -> anyhow::Result<()> {
    let state = setup_state_with(test_config(CartBackend::Session), Arc::new(FailingMailer)).await?;

    let result = auth_service::register_user(&state, form()).await;
    assert!(matches!(result, Err(AppError::Dispatch(_))));
    assert!(state.otp.peek(EMAIL).await.is_none());

    let refused = auth_service::login_user(&state, login("secret1")).await;
    assert!(matches!(refused, Err(AppError::NotVerified)));
    Ok(())
}

#[tokio::test]
async fn code_survives_a_failed_verification_write() -> anyhow::Result<()> {
    let state = setup_state_with(
        test_config(CartBackend::Session),
        Arc::new(RecordingMailer::default()),
    )
    .await?;
    auth_service::register_user(&state, form()).await?;
    let code = state.otp.peek(EMAIL).await.expect("code issued").code;

    state
        .orm
        .execute_unprepared("ALTER TABLE users RENAME TO users_offline")
        .await?;
    let failed = auth_service::verify_otp(&state, EMAIL, &code).await;
    assert!(matches!(failed, Err(AppError::Persistence(_))));
    assert_eq!(state.otp.peek(EMAIL).await.map(|r| r.code), Some(code.clone()));

    state
        .orm
        .execute_unprepared("ALTER TABLE users_offline RENAME TO users")
        .await?;
    let verified = auth_service::verify_otp(&state, EMAIL, &code).await?;
    assert!(verified.data.expect("user").verified);
    Ok(())
}

