use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tower_sessions::Session;

use crate::{
    cart::{CartStore, SessionCartStore, TableCartStore},
    config::{AppConfig, CartBackend},
    mailer::Mailer,
    middleware::auth::JwtKeys,
    otp::OtpCache,
};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub otp: OtpCache,
    pub mailer: Arc<dyn Mailer>,
    pub jwt: JwtKeys,
    pub cart_backend: CartBackend,
    pub checkout_decrements_stock: bool,
}

impl AppState {
    pub fn new(orm: DatabaseConnection, config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            orm,
            otp: OtpCache::new(std::time::Duration::from_secs(config.otp_ttl_seconds)),
            mailer,
            jwt: JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours),
            cart_backend: config.cart_backend,
            checkout_decrements_stock: config.checkout_decrements_stock,
        }
    }

    pub fn cart_store(&self, session: Session) -> Box<dyn CartStore> {
        match self.cart_backend {
            CartBackend::Session => Box::new(SessionCartStore::new(session)),
            CartBackend::Table => Box::new(TableCartStore::new(self.orm.clone())),
        }
    }
}
