use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::Utc;
use password_hash::rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, Set, SqlErr,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{LoginRequest, LoginResponse, OtpDispatch, RegisterRequest},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    mailer::{OTP_SUBJECT, otp_email_body},
    middleware::auth::Role,
    models::User,
    otp::normalize_email,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const CONTACT_DIGITS: usize = 8;

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    validate_registration(&payload)?;
    let email = normalize_email(&payload.email);

    let user = insert_user(
        state,
        NewAccount {
            username: payload.username.trim(),
            email: &email,
            password: &payload.password,
            address: payload.address.trim(),
            contact: payload.contact.trim(),
            role: Role::User,
            verified: false,
        },
    )
    .await?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    // The account stays even if the email cannot be sent; a resend recovers it.
    send_otp(state, &email).await?;

    Ok(ApiResponse::success(
        "Registration successful! Check your email for the verification code.",
        user,
        Some(Meta::empty()),
    ))
}

pub async fn request_otp(state: &AppState, email: &str) -> AppResult<ApiResponse<OtpDispatch>> {
    let email = normalize_email(email);
    let user = find_by_email(state, &email)
        .await?
        .ok_or(AppError::NotFound)?;

    if user.verified {
        return Ok(ApiResponse::success(
            "Account is already verified",
            OtpDispatch::AlreadyVerified,
            Some(Meta::empty()),
        ));
    }

    send_otp(state, &email).await?;

    Ok(ApiResponse::success(
        "Verification code sent",
        OtpDispatch::Sent,
        Some(Meta::empty()),
    ))
}

pub async fn verify_otp(
    state: &AppState,
    email: &str,
    code: &str,
) -> AppResult<ApiResponse<User>> {
    let email = normalize_email(email);
    let record = state.otp.redeem(&email, code).await?;

    let updated = Users::update_many()
        .col_expr(UserCol::Verified, Expr::value(true))
        .filter(UserCol::Email.eq(email.as_str()))
        .exec(&state.orm)
        .await;
    if let Err(err) = updated {
        // Leave the code usable so the user can retry once the store recovers.
        state.otp.restore(&email, record).await;
        return Err(err.into());
    }

    let user = find_by_email(state, &email)
        .await?
        .ok_or(AppError::NotFound)?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_verified",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Email verified. You can now log in.",
        User::from(user),
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation("All fields are required.".into()));
    }

    let user = find_by_email(state, &normalize_email(&email))
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    // Unverified accounts are refused before the password is even checked.
    if !user.verified {
        return Err(AppError::NotVerified);
    }

    if !verify_password(&user.password_hash, &password)? {
        return Err(AppError::InvalidCredentials);
    }

    let role = user.role.parse::<Role>()?;
    let token = state.jwt.issue(user.id, role)?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Login successful!",
        LoginResponse {
            token: format!("Bearer {}", token),
            user: User::from(user),
        },
        Some(Meta::empty()),
    ))
}

pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub address: &'a str,
    pub contact: &'a str,
    pub role: Role,
    pub verified: bool,
}

pub async fn insert_user(state: &AppState, account: NewAccount<'_>) -> AppResult<User> {
    if find_by_email(state, account.email).await?.is_some() {
        return Err(AppError::EmailTaken);
    }

    let password_hash = hash_password(account.password)?;

    let inserted = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(account.username.to_string()),
        email: Set(account.email.to_string()),
        password_hash: Set(password_hash),
        address: Set(account.address.to_string()),
        contact: Set(account.contact.to_string()),
        role: Set(account.role.as_str().to_string()),
        verified: Set(account.verified),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await;

    match inserted {
        Ok(user) => Ok(User::from(user)),
        Err(err) if is_unique_violation(&err) => Err(AppError::EmailTaken),
        Err(err) => Err(err.into()),
    }
}

pub fn validate_registration(payload: &RegisterRequest) -> AppResult<()> {
    let required = [
        &payload.username,
        &payload.email,
        &payload.password,
        &payload.address,
        &payload.contact,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(AppError::Validation("All fields are required.".into()));
    }

    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    let contact = payload.contact.trim();
    if contact.chars().count() != CONTACT_DIGITS {
        return Err(AppError::Validation(format!(
            "Contact number must be exactly {CONTACT_DIGITS} digits"
        )));
    }
    if !contact.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "Contact number must contain only digits".into(),
        ));
    }

    Ok(())
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

async fn find_by_email(state: &AppState, email: &str) -> AppResult<Option<UserModel>> {
    let user = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(&state.orm)
        .await?;
    Ok(user)
}

async fn send_otp(state: &AppState, email: &str) -> AppResult<()> {
    let code = state.otp.issue(email).await;
    let ttl_minutes = state.otp.ttl().as_secs().div_ceil(60);

    if let Err(err) = state
        .mailer
        .send(email, OTP_SUBJECT, &otp_email_body(&code, ttl_minutes))
        .await
    {
        state.otp.invalidate(email).await;
        tracing::warn!(error = %err, email = %email, "verification email failed");
        return Err(AppError::Dispatch(err));
    }

    tracing::debug!(email = %email, "verification code sent");
    Ok(())
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RegisterRequest {
        RegisterRequest {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "secret1".into(),
            address: "1 Market St".into(),
            contact: "91234567".into(),
        }
    }

    fn message(result: AppResult<()>) -> String {
        match result {
            Err(AppError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_complete_registration() {
        assert!(validate_registration(&valid()).is_ok());
    }

    #[test]
    fn rejects_missing_field() {
        let payload = RegisterRequest {
            address: "  ".into(),
            ..valid()
        };
        assert_eq!(message(validate_registration(&payload)), "All fields are required.");
    }

    #[test]
    fn rejects_short_password() {
        let payload = RegisterRequest {
            password: "12345".into(),
            ..valid()
        };
        assert!(message(validate_registration(&payload)).contains("at least 6"));
    }

    #[test]
    fn contact_must_be_eight_digits() {
        for contact in ["1234567", "123456789", "1234567a"] {
            let payload = RegisterRequest {
                contact: contact.into(),
                ..valid()
            };
            assert!(validate_registration(&payload).is_err(), "{contact}");
        }
    }

    #[test]
    fn password_hash_is_salted_and_verifiable() {
        let a = hash_password("secret1").unwrap();
        let b = hash_password("secret1").unwrap();

        assert_ne!(a, b);
        assert!(verify_password(&a, "secret1").unwrap());
        assert!(!verify_password(&a, "secret2").unwrap());
    }
}
