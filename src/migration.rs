use sea_orm::{EntityTrait, Schema};
use sea_orm_migration::prelude::*;

use crate::entity::{
    AuditLogs, CartItems, OrderItems, Orders, Products, Users, cart_items::Column as CartCol,
};

const CART_LINE_INDEX: &str = "idx-cart_items-user_product";

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(CreateStorefrontTables),
            Box::new(UniqueCartLines),
        ]
    }
}

struct CreateStorefrontTables;

impl MigrationName for CreateStorefrontTables {
    fn name(&self) -> &str {
        "m20250101_000001_create_storefront_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateStorefrontTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Tables are derived from the entities so Postgres and SQLite share one definition.
        let schema = Schema::new(manager.get_database_backend());

        create_table(manager, &schema, Users).await?;
        create_table(manager, &schema, Products).await?;
        create_table(manager, &schema, CartItems).await?;
        create_table(manager, &schema, Orders).await?;
        create_table(manager, &schema, OrderItems).await?;
        create_table(manager, &schema, AuditLogs).await?;

        let indexes = schema
            .create_index_from_entity(Orders)
            .into_iter()
            .chain(schema.create_index_from_entity(AuditLogs));
        for mut index in indexes {
            manager.create_index(index.if_not_exists().to_owned()).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLogs).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderItems).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CartItems).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

struct UniqueCartLines;

impl MigrationName for UniqueCartLines {
    fn name(&self) -> &str {
        "m20250101_000002_unique_cart_lines"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for UniqueCartLines {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name(CART_LINE_INDEX)
                    .table(CartItems)
                    .col(CartCol::UserId)
                    .col(CartCol::ProductId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name(CART_LINE_INDEX).table(CartItems).to_owned())
            .await
    }
}

async fn create_table<E: EntityTrait>(
    manager: &SchemaManager<'_>,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    let mut stmt = schema.create_table_from_entity(entity);
    manager.create_table(stmt.if_not_exists().to_owned()).await
}
