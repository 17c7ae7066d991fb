use async_trait::async_trait;
use uuid::Uuid;

use crate::{error::AppResult, models::CartLine};

pub mod session;
pub mod table;

pub use session::SessionCartStore;
pub use table::TableCartStore;

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get(&self, user_id: Uuid) -> AppResult<Vec<CartLine>>;

    async fn find(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Option<CartLine>> {
        let lines = self.get(user_id).await?;
        Ok(lines.into_iter().find(|line| line.product_id == product_id))
    }

    async fn merge_line(&self, user_id: Uuid, line: CartLine) -> AppResult<CartLine>;

    async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<CartLine>;

    async fn remove(&self, user_id: Uuid, product_id: Uuid) -> AppResult<()>;

    async fn clear(&self, user_id: Uuid) -> AppResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityUpdate {
    Increase,
    Decrease,
    Input(String),
}

impl QuantityUpdate {
    pub fn from_request(action: Option<&str>, quantity: Option<&str>) -> Self {
        match action.map(str::trim) {
            Some("increase") => QuantityUpdate::Increase,
            Some("decrease") => QuantityUpdate::Decrease,
            _ => QuantityUpdate::Input(quantity.unwrap_or_default().to_string()),
        }
    }

    pub fn apply(&self, current: i32) -> i32 {
        match self {
            QuantityUpdate::Increase => current.saturating_add(1),
            QuantityUpdate::Decrease if current > 1 => current - 1,
            QuantityUpdate::Decrease => current,
            QuantityUpdate::Input(raw) => match raw.trim().parse::<i32>() {
                Ok(value) if value >= 1 => value,
                _ => current,
            },
        }
    }
}

pub(crate) fn merge_into(lines: &mut Vec<CartLine>, line: CartLine) -> CartLine {
    if let Some(existing) = lines.iter_mut().find(|l| l.product_id == line.product_id) {
        existing.quantity = existing.quantity.saturating_add(line.quantity);
        return existing.clone();
    }
    lines.push(line.clone());
    line
}
