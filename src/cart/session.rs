use async_trait::async_trait;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    cart::{CartStore, merge_into},
    error::{AppError, AppResult},
    models::CartLine,
};

#[derive(Clone)]
pub struct SessionCartStore {
    session: Session,
}

impl SessionCartStore {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    fn key(user_id: Uuid) -> String {
        format!("cart:{user_id}")
    }

    async fn write(&self, user_id: Uuid, lines: Vec<CartLine>) -> AppResult<()> {
        self.session.insert(&Self::key(user_id), lines).await?;
        Ok(())
    }
}

#[async_trait]
impl CartStore for SessionCartStore {
    async fn get(&self, user_id: Uuid) -> AppResult<Vec<CartLine>> {
        let lines = self
            .session
            .get::<Vec<CartLine>>(&Self::key(user_id))
            .await?
            .unwrap_or_default();
        Ok(lines)
    }

    async fn merge_line(&self, user_id: Uuid, line: CartLine) -> AppResult<CartLine> {
        let mut lines = self.get(user_id).await?;
        let merged = merge_into(&mut lines, line);
        self.write(user_id, lines).await?;
        Ok(merged)
    }

    async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<CartLine> {
        let mut lines = self.get(user_id).await?;
        let line = lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or(AppError::NotFound)?;
        line.quantity = quantity;
        let updated = line.clone();
        self.write(user_id, lines).await?;
        Ok(updated)
    }

    async fn remove(&self, user_id: Uuid, product_id: Uuid) -> AppResult<()> {
        let mut lines = self.get(user_id).await?;
        let before = lines.len();
        lines.retain(|l| l.product_id != product_id);
        if lines.len() != before {
            self.write(user_id, lines).await?;
        }
        Ok(())
    }

    async fn clear(&self, user_id: Uuid) -> AppResult<()> {
        self.session
            .remove::<Vec<CartLine>>(&Self::key(user_id))
            .await?;
        Ok(())
    }
}
