use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use crate::{
    cart::CartStore,
    entity::cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems, Model},
    error::{AppError, AppResult},
    models::CartLine,
};

#[derive(Clone)]
pub struct TableCartStore {
    orm: DatabaseConnection,
}

impl TableCartStore {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }

    fn line_filter(user_id: Uuid, product_id: Uuid) -> Condition {
        Condition::all()
            .add(CartCol::UserId.eq(user_id))
            .add(CartCol::ProductId.eq(product_id))
    }
}

fn line_from_entity(model: Model) -> CartLine {
    CartLine {
        product_id: model.product_id,
        product_name: model.product_name,
        unit_price: model.unit_price,
        quantity: model.quantity,
        image_ref: model.image_ref,
    }
}

#[async_trait]
impl CartStore for TableCartStore {
    async fn get(&self, user_id: Uuid) -> AppResult<Vec<CartLine>> {
        let lines = CartItems::find()
            .filter(CartCol::UserId.eq(user_id))
            .order_by_asc(CartCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(line_from_entity)
            .collect();
        Ok(lines)
    }

    async fn find(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Option<CartLine>> {
        let line = CartItems::find()
            .filter(Self::line_filter(user_id, product_id))
            .one(&self.orm)
            .await?
            .map(line_from_entity);
        Ok(line)
    }

    async fn merge_line(&self, user_id: Uuid, line: CartLine) -> AppResult<CartLine> {
        // Single upsert on (user_id, product_id); the existing snapshot is kept.
        let row = CartActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(line.product_id),
            product_name: Set(line.product_name.clone()),
            unit_price: Set(line.unit_price),
            quantity: Set(line.quantity),
            image_ref: Set(line.image_ref.clone()),
            created_at: Set(Utc::now().into()),
        };

        CartItems::insert(row)
            .on_conflict(
                OnConflict::columns([CartCol::UserId, CartCol::ProductId])
                    .value(
                        CartCol::Quantity,
                        Expr::col((CartItems, CartCol::Quantity)).add(line.quantity),
                    )
                    .to_owned(),
            )
            .exec_without_returning(&self.orm)
            .await?;

        self.find(user_id, line.product_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<CartLine> {
        let existing = CartItems::find()
            .filter(Self::line_filter(user_id, product_id))
            .one(&self.orm)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: CartActive = existing.into();
        active.quantity = Set(quantity);
        let updated = active.update(&self.orm).await?;
        Ok(line_from_entity(updated))
    }

    async fn remove(&self, user_id: Uuid, product_id: Uuid) -> AppResult<()> {
        CartItems::delete_many()
            .filter(Self::line_filter(user_id, product_id))
            .exec(&self.orm)
            .await?;
        Ok(())
    }

    async fn clear(&self, user_id: Uuid) -> AppResult<()> {
        CartItems::delete_many()
            .filter(CartCol::UserId.eq(user_id))
            .exec(&self.orm)
            .await?;
        Ok(())
    }
}
