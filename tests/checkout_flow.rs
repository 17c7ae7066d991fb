mod common;

use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};
use async_trait::async_trait;
use supermarket_api::{
    cart::{CartStore, SessionCartStore},
    config::CartBackend,
    dto::{
        cart::AddToCartRequest,
        products::{CreateProductRequest, UpdateProductRequest},
    },
    entity::{order_items::Entity as OrderItems, orders::Entity as Orders, products::Entity as Products},
    error::{AppError, AppResult},
    middleware::auth::Role,
    models::CartLine,
    routes::params::OrderListQuery,
    services::{admin_service, cart_service, order_service, product_service},
};
use uuid::Uuid;

use common::{create_account, create_product, new_session, setup_state, setup_state_with, test_config};

fn add(product_id: Uuid, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        product_id,
        quantity: Some(quantity),
    }
}

#[tokio::test]
async fn checkout_turns_cart_into_order() -> anyhow::Result<()> {
    for backend in [CartBackend::Session, CartBackend::Table] {
        let state = setup_state(backend).await?;
        let shopper = create_account(&state, "shopper@example.com", Role::User).await?;
        let admin = create_account(&state, "admin@example.com", Role::Admin).await?;
        let stranger = create_account(&state, "other@example.com", Role::User).await?;

        let apples = create_product(&state, "Apples", 250, 10).await?;
        let bread = create_product(&state, "Bread", 1000, 5).await?;

        let cart = state.cart_store(new_session());
        cart_service::add_to_cart(&state, cart.as_ref(), &shopper, add(apples.id, 3)).await?;
        cart_service::add_to_cart(&state, cart.as_ref(), &shopper, add(bread.id, 1)).await?;

        let resp = order_service::checkout(&state, cart.as_ref(), &shopper).await?;
        assert_eq!(resp.message, "Order placed successfully!");
        let placed = resp.data.expect("order data");

        assert_eq!(placed.order.total_amount, 1750, "{backend:?}");
        assert_eq!(placed.order.status, "pending");
        assert_eq!(placed.order.user_id, shopper.user_id);
        assert_eq!(placed.items.len(), 2, "{backend:?}");
        assert!(cart.get(shopper.user_id).await?.is_empty(), "{backend:?}");

        let sum: i64 = placed
            .items
            .iter()
            .map(|item| item.unit_price * i64::from(item.quantity))
            .sum();
        assert_eq!(sum, placed.order.total_amount);

        let own = order_service::get_order(&state, &shopper, placed.order.id).await?;
        assert_eq!(own.data.expect("order").items.len(), 2);
        order_service::get_order(&state, &admin, placed.order.id).await?;

        let denied = order_service::get_order(&state, &stranger, placed.order.id).await;
        assert!(matches!(denied, Err(AppError::AccessDenied)), "{backend:?}");

        let history =
            order_service::list_orders(&state, &shopper, OrderListQuery::default()).await?;
        assert_eq!(history.data.expect("orders").items.len(), 1);
        let none = order_service::list_orders(&state, &stranger, OrderListQuery::default()).await?;
        assert!(none.data.expect("orders").items.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn empty_cart_cannot_check_out() -> anyhow::Result<()> {
    let state = setup_state(CartBackend::Session).await?;
    let shopper = create_account(&state, "shopper@example.com", Role::User).await?;
    let cart = state.cart_store(new_session());

    let result = order_service::checkout(&state, cart.as_ref(), &shopper).await;
    assert!(matches!(result, Err(AppError::EmptyCart)));
    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn order_uses_price_from_when_item_was_added() -> anyhow::Result<()> {
    let state = setup_state(CartBackend::Table).await?;
    let shopper = create_account(&state, "shopper@example.com", Role::User).await?;
    let admin = create_account(&state, "admin@example.com", Role::Admin).await?;
    let milk = create_product(&state, "Milk", 320, 20).await?;

    let cart = state.cart_store(new_session());
    cart_service::add_to_cart(&state, cart.as_ref(), &shopper, add(milk.id, 2)).await?;

    product_service::update_product(
        &state,
        &admin,
        milk.id,
        UpdateProductRequest {
            price: Some(999),
            ..Default::default()
        },
    )
    .await?;

    let placed = order_service::checkout(&state, cart.as_ref(), &shopper)
        .await?
        .data
        .expect("order");
    assert_eq!(placed.order.total_amount, 640);
    assert_eq!(placed.items[0].unit_price, 320);
    Ok(())
}

#[tokio::test]
async fn failed_write_leaves_no_order_and_keeps_cart() -> anyhow::Result<()> {
    let state = setup_state(CartBackend::Session).await?;
    let shopper = create_account(&state, "shopper@example.com", Role::User).await?;
    let eggs = create_product(&state, "Eggs", 540, 12).await?;

    let cart = state.cart_store(new_session());
    cart_service::add_to_cart(&state, cart.as_ref(), &shopper, add(eggs.id, 2)).await?;

    state
        .orm
        .execute_unprepared("DROP TABLE order_items")
        .await?;

    let result = order_service::checkout(&state, cart.as_ref(), &shopper).await;
    assert!(matches!(result, Err(AppError::CheckoutFailed(_))));

    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    assert_eq!(cart.get(shopper.user_id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn stock_is_decremented_only_when_enabled() -> anyhow::Result<()> {
    let mut config = test_config(CartBackend::Session);
    config.checkout_decrements_stock = true;
    let state = setup_state_with(config, std::sync::Arc::new(common::RecordingMailer::default())).await?;
    let shopper = create_account(&state, "shopper@example.com", Role::User).await?;
    let rice = create_product(&state, "Rice", 1890, 3).await?;

    let cart = state.cart_store(new_session());
    cart_service::add_to_cart(&state, cart.as_ref(), &shopper, add(rice.id, 2)).await?;
    order_service::checkout(&state, cart.as_ref(), &shopper).await?;

    let stock = Products::find_by_id(rice.id)
        .one(&state.orm)
        .await?
        .expect("product")
        .stock;
    assert_eq!(stock, 1);

    // Two more fit the per-request check but exceed what is left at checkout.
    cart_service::add_to_cart(&state, cart.as_ref(), &shopper, add(rice.id, 1)).await?;
    cart_service::add_to_cart(&state, cart.as_ref(), &shopper, add(rice.id, 1)).await?;
    let result = order_service::checkout(&state, cart.as_ref(), &shopper).await;
    assert!(matches!(result, Err(AppError::InsufficientStock(id)) if id == rice.id));

    assert_eq!(Orders::find().count(&state.orm).await?, 1);
    assert_eq!(OrderItems::find().count(&state.orm).await?, 1);
    assert_eq!(cart.get(shopper.user_id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn stock_is_untouched_by_default() -> anyhow::Result<()> {
    let state = setup_state(CartBackend::Session).await?;
    let shopper = create_account(&state, "shopper@example.com", Role::User).await?;
    let rice = create_product(&state, "Rice", 1890, 3).await?;

    let cart = state.cart_store(new_session());
    cart_service::add_to_cart(&state, cart.as_ref(), &shopper, add(rice.id, 3)).await?;
    order_service::checkout(&state, cart.as_ref(), &shopper).await?;

    let stock = Products::find_by_id(rice.id)
        .one(&state.orm)
        .await?
        .expect("product")
        .stock;
    assert_eq!(stock, 3);
    Ok(())
}

/// Session cart whose `clear` always fails.
struct StickyCart {
    inner: SessionCartStore,
}

#[async_trait]
impl CartStore for StickyCart {
    async fn get(&self, user_id: Uuid) -> AppResult<Vec<CartLine>> {
        self.inner.get(user_id).await
    }

    async fn merge_line(&self, user_id: Uuid, line: CartLine) -> AppResult<CartLine> {
        self.inner.merge_line(user_id, line).await
    }

    async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<CartLine> {
        self.inner.set_quantity(user_id, product_id, quantity).await
    }

    async fn remove(&self, user_id: Uuid, product_id: Uuid) -> AppResult<()> {
        self.inner.remove(user_id, product_id).await
    }

    async fn clear(&self, _user_id: Uuid) -> AppResult<()> {
        Err(AppError::Internal(anyhow::anyhow!("session store unavailable")))
    }
}

#[tokio::test]
async fn order_stands_when_cart_cannot_be_cleared() -> anyhow::Result<()> {
    let state = setup_state(CartBackend::Session).await?;
    let shopper = create_account(&state, "shopper@example.com", Role::User).await?;
    let eggs = create_product(&state, "Eggs", 540, 12).await?;

    let cart = StickyCart {
        inner: SessionCartStore::new(new_session()),
    };
    cart_service::add_to_cart(&state, &cart, &shopper, add(eggs.id, 2)).await?;

    let placed = order_service::checkout(&state, &cart, &shopper)
        .await?
        .data
        .expect("order");
    assert_eq!(placed.order.total_amount, 1080);
    assert_eq!(Orders::find().count(&state.orm).await?, 1);
    assert_eq!(cart.get(shopper.user_id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn corrupted_cart_lines_are_rejected() -> anyhow::Result<()> {
    let state = setup_state(CartBackend::Session).await?;
    let shopper = create_account(&state, "shopper@example.com", Role::User).await?;

    for (unit_price, quantity) in [(0, 2), (250, 0), (-5, 1)] {
        let cart = SessionCartStore::new(new_session());
        cart.merge_line(
            shopper.user_id,
            CartLine {
                product_id: Uuid::new_v4(),
                product_name: "Apples".into(),
                unit_price,
                quantity,
                image_ref: None,
            },
        )
        .await?;

        let result = order_service::checkout(&state, &cart, &shopper).await;
        assert!(
            matches!(result, Err(AppError::InvalidCartData)),
            "price {unit_price}, quantity {quantity}"
        );
        assert_eq!(cart.get(shopper.user_id).await?.len(), 1);
    }

    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn deleted_account_cannot_check_out() -> anyhow::Result<()> {
    let state = setup_state(CartBackend::Session).await?;
    let shopper = create_account(&state, "shopper@example.com", Role::User).await?;
    let admin = create_account(&state, "admin@example.com", Role::Admin).await?;
    let milk = create_product(&state, "Milk", 320, 10).await?;

    let cart = state.cart_store(new_session());
    cart_service::add_to_cart(&state, cart.as_ref(), &shopper, add(milk.id, 1)).await?;

    admin_service::delete_user(&state, &admin, shopper.user_id).await?;

    let result = order_service::checkout(&state, cart.as_ref(), &shopper).await;
    assert!(matches!(result, Err(AppError::Unauthorized(_))));
    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn prices_above_the_ceiling_are_rejected() -> anyhow::Result<()> {
    let state = setup_state(CartBackend::Session).await?;
    let admin = create_account(&state, "admin@example.com", Role::Admin).await?;

    let result = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: "Gold Bar".into(),
            stock: 1,
            price: product_service::MAX_PRICE + 1,
            image_ref: None,
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(Products::find().count(&state.orm).await?, 0);
    Ok(())
}
