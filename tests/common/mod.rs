#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use supermarket_api::{
    config::{AppConfig, CartBackend},
    db::{create_orm_conn, run_migrations},
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    mailer::{EmailError, Mailer},
    middleware::auth::{AuthUser, Role},
    models::Product,
    services::auth_service::hash_password,
    state::AppState,
};
use tower_sessions::{MemoryStore, Session};
use uuid::Uuid;

/// Captures every message instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    pub fn count_for(&self, to: &str) -> usize {
        self.sent
            .lock()
            .map(|sent| sent.iter().filter(|(addr, _)| addr == to).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, _subject: &str, body_html: &str) -> Result<(), EmailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((to.to_string(), body_html.to_string()));
        }
        Ok(())
    }
}

pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _to: &str, _subject: &str, _body_html: &str) -> Result<(), EmailError> {
        Err(EmailError::Unavailable("relay refused connection".into()))
    }
}

pub fn test_config(cart_backend: CartBackend) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        jwt_ttl_hours: 1,
        cart_backend,
        otp_ttl_seconds: 180,
        checkout_decrements_stock: false,
        mail_from: "Supermarket <no-reply@localhost>".into(),
        smtp: None,
    }
}

pub async fn setup_state_with(config: AppConfig, mailer: Arc<dyn Mailer>) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    Ok(AppState::new(orm, &config, mailer))
}

pub async fn setup_state(cart_backend: CartBackend) -> anyhow::Result<AppState> {
    setup_state_with(test_config(cart_backend), Arc::new(RecordingMailer::default())).await
}

pub fn new_session() -> Session {
    Session::new(None, Arc::new(MemoryStore::default()), None)
}

/// Insert a verified account directly and return its identity.
pub async fn create_account(state: &AppState, email: &str, role: Role) -> anyhow::Result<AuthUser> {
    let password_hash = hash_password("secret1").map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(email.split('@').next().unwrap_or("user").to_string()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        address: Set("1 Market St".into()),
        contact: Set("91234567".into()),
        role: Set(role.as_str().to_string()),
        verified: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role,
    })
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Product> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        stock: Set(stock),
        price: Set(price),
        image_ref: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(Product::from(product))
}
