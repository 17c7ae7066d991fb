use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use rand::Rng;

use crate::error::{AppError, AppResult};

const MAX_LIVE_CODES: u64 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct OtpCache {
    entries: Cache<String, OtpRecord>,
    ttl: Duration,
}

impl OtpCache {
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(MAX_LIVE_CODES)
            .time_to_live(ttl)
            .build();
        Self { entries, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn issue(&self, email: &str) -> String {
        self.issue_at(email, Utc::now()).await
    }

    pub async fn issue_at(&self, email: &str, now: DateTime<Utc>) -> String {
        let code = generate_code();
        self.store_at(email, &code, now).await;
        code
    }

    pub async fn store_at(&self, email: &str, code: &str, now: DateTime<Utc>) {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::days(1));
        let record = OtpRecord {
            code: code.to_string(),
            expires_at: now + ttl,
        };
        self.entries.insert(normalize_email(email), record).await;
    }

    pub async fn peek(&self, email: &str) -> Option<OtpRecord> {
        self.entries.get(&normalize_email(email)).await
    }

    pub async fn redeem(&self, email: &str, submitted: &str) -> AppResult<OtpRecord> {
        self.redeem_at(email, submitted, Utc::now()).await
    }

    pub async fn redeem_at(
        &self,
        email: &str,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> AppResult<OtpRecord> {
        let key = normalize_email(email);
        let record = self.entries.get(&key).await.ok_or(AppError::OtpExpired)?;

        if now > record.expires_at {
            self.entries.invalidate(&key).await;
            return Err(AppError::OtpExpired);
        }

        if record.code != submitted.trim() {
            return Err(AppError::OtpMismatch);
        }

        // Only the caller that actually removes the matching record wins.
        match self.entries.remove(&key).await {
            Some(removed) if removed == record => Ok(removed),
            Some(newer) => {
                self.entries.insert(key, newer).await;
                Err(AppError::OtpMismatch)
            }
            None => Err(AppError::OtpExpired),
        }
    }

    // A newer code issued in the meantime wins over the restored one.
    pub async fn restore(&self, email: &str, record: OtpRecord) {
        self.entries
            .entry(normalize_email(email))
            .or_insert(record)
            .await;
    }

    pub async fn invalidate(&self, email: &str) {
        self.entries.invalidate(&normalize_email(email)).await;
    }
}

pub fn generate_code() -> String {
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}
