use std::env;

use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartBackend {
    Session,
    Table,
}

impl CartBackend {
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(CartBackend::Session),
            "table" | "db" | "database" => Ok(CartBackend::Table),
            other => anyhow::bail!("unknown CART_BACKEND `{other}`"),
        }
    }
}

pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub cart_backend: CartBackend,
    pub otp_ttl_seconds: u64,
    pub checkout_decrements_stock: bool,
    pub mail_from: String,
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let jwt_ttl_hours = env::var("JWT_TTL_HOURS")
            .ok()
            .and_then(|h| h.parse::<i64>().ok())
            .unwrap_or(24);
        let cart_backend = match env::var("CART_BACKEND") {
            Ok(value) => CartBackend::parse(&value)?,
            Err(_) => CartBackend::Session,
        };
        let otp_ttl_seconds = env::var("OTP_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(180);
        let checkout_decrements_stock = env::var("CHECKOUT_DECREMENT_STOCK")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        let mail_from =
            env::var("MAIL_FROM").unwrap_or_else(|_| "Supermarket <no-reply@localhost>".into());

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(587),
                username: env::var("SMTP_USERNAME").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            }),
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_ttl_hours,
            cart_backend,
            otp_ttl_seconds,
            checkout_decrements_stock,
            mail_from,
            smtp,
        })
    }
}
