use uuid::Uuid;

use crate::{
    cart::{CartStore, QuantityUpdate},
    dto::cart::{AddToCartRequest, CartView},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartLine, cart_total},
    response::{ApiResponse, Meta},
    services::product_service::find_product,
    state::AppState,
};

pub async fn view_cart(cart: &dyn CartStore, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let items = cart.get(user.user_id).await?;
    let total = cart_total(&items);
    let meta = Meta::whole(items.len());
    Ok(ApiResponse::success("OK", CartView { items, total }, Some(meta)))
}

/// Add `quantity` of a product. Stock is checked against this request only;
/// the accumulated cart quantity is not compared with stock here.
pub async fn add_to_cart(
    state: &AppState,
    cart: &dyn CartStore,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartLine>> {
    let quantity = payload.quantity.unwrap_or(1);
    if quantity <= 0 {
        return Err(AppError::Validation(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = find_product(&state.orm, payload.product_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if quantity > product.stock {
        return Err(AppError::InsufficientStock(product.id));
    }

    let line = cart
        .merge_line(user.user_id, CartLine::from_product(&product, quantity))
        .await?;

    tracing::debug!(
        user_id = %user.user_id,
        product_id = %product.id,
        quantity = line.quantity,
        "cart line added"
    );

    Ok(ApiResponse::success("Product added to cart", line, None))
}

pub async fn update_quantity(
    cart: &dyn CartStore,
    user: &AuthUser,
    product_id: Uuid,
    update: QuantityUpdate,
) -> AppResult<ApiResponse<CartLine>> {
    let line = cart
        .find(user.user_id, product_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let quantity = update.apply(line.quantity);
    let line = if quantity == line.quantity {
        line
    } else {
        cart.set_quantity(user.user_id, product_id, quantity).await?
    };

    Ok(ApiResponse::success("Cart updated", line, None))
}

pub async fn remove_from_cart(
    cart: &dyn CartStore,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    cart.remove(user.user_id, product_id).await?;

    Ok(ApiResponse::success(
        "Product removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
