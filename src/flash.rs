use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use utoipa::ToSchema;

use crate::{error::AppResult, response::ApiResponse};

const FLASH_KEY: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

pub async fn push(session: &Session, level: FlashLevel, message: impl Into<String>) -> AppResult<()> {
    let mut pending = session
        .get::<Vec<Flash>>(FLASH_KEY)
        .await?
        .unwrap_or_default();
    pending.push(Flash {
        level,
        message: message.into(),
    });
    session.insert(FLASH_KEY, pending).await?;
    Ok(())
}

pub async fn notify(session: &Session, level: FlashLevel, message: impl Into<String>) {
    if let Err(err) = push(session, level, message).await {
        tracing::warn!(error = %err, "flash message dropped");
    }
}

/// Success notice carrying the response message, or an error notice carrying the failure.
pub fn for_outcome<T>(outcome: &AppResult<ApiResponse<T>>) -> Flash {
    match outcome {
        Ok(resp) => Flash {
            level: FlashLevel::Success,
            message: resp.message.clone(),
        },
        Err(err) => Flash {
            level: FlashLevel::Error,
            message: err.to_string(),
        },
    }
}

/// Record the notice for a handler outcome and hand the outcome back unchanged.
pub async fn report<T>(
    session: &Session,
    outcome: AppResult<ApiResponse<T>>,
) -> AppResult<ApiResponse<T>> {
    let Flash { level, message } = for_outcome(&outcome);
    notify(session, level, message).await;
    outcome
}

pub async fn take(session: &Session) -> AppResult<Vec<Flash>> {
    let pending = session
        .remove::<Vec<Flash>>(FLASH_KEY)
        .await?
        .unwrap_or_default();
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;
    use crate::error::AppError;

    #[tokio::test]
    async fn messages_are_consumed_once() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        push(&session, FlashLevel::Success, "Cart updated").await.unwrap();
        push(&session, FlashLevel::Error, "Item not found in cart").await.unwrap();

        let first = take(&session).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].message, "Cart updated");
        assert_eq!(first[1].level, FlashLevel::Error);

        assert!(take(&session).await.unwrap().is_empty());
    }

    #[test]
    fn outcome_picks_level_and_message() {
        let ok: AppResult<ApiResponse<()>> =
            Ok(ApiResponse::success("Product added to cart", (), None));
        assert_eq!(
            for_outcome(&ok),
            Flash {
                level: FlashLevel::Success,
                message: "Product added to cart".into(),
            }
        );

        let failed: AppResult<ApiResponse<()>> = Err(AppError::EmptyCart);
        assert_eq!(
            for_outcome(&failed),
            Flash {
                level: FlashLevel::Error,
                message: "Your cart is empty".into(),
            }
        );
    }

    #[tokio::test]
    async fn failures_leave_an_error_notice() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        let outcome: AppResult<ApiResponse<()>> = Err(AppError::NotFound);
        assert!(report(&session, outcome).await.is_err());

        let pending = take(&session).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].level, FlashLevel::Error);
    }
}
