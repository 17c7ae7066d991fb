use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    cart::QuantityUpdate,
    dto::cart::{AddToCartRequest, CartView, UpdateCartRequest},
    error::AppResult,
    flash,
    middleware::auth::AuthUser,
    models::CartLine,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_list).post(add_to_cart))
        .route(
            "/{product_id}",
            patch(update_cart_item).delete(remove_from_cart),
        )
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart lines and total for current user", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    session: Session,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let cart = state.cart_store(session);
    let resp = cart_service::view_cart(cart.as_ref(), &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add product or increase its quantity", body = ApiResponse<CartLine>),
        (status = 400, description = "Invalid quantity or not enough stock"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    session: Session,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartLine>>> {
    let cart = state.cart_store(session.clone());
    let outcome = cart_service::add_to_cart(&state, cart.as_ref(), &user, payload).await;
    let resp = flash::report(&session, outcome).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/cart/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateCartRequest,
    responses(
        (status = 200, description = "Quantity changed (invalid input leaves it unchanged)", body = ApiResponse<CartLine>),
        (status = 404, description = "Item not found in cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    session: Session,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateCartRequest>,
) -> AppResult<Json<ApiResponse<CartLine>>> {
    let update = QuantityUpdate::from_request(
        payload.action.as_deref(),
        payload.raw_quantity().as_deref(),
    );
    let cart = state.cart_store(session.clone());
    let outcome = cart_service::update_quantity(cart.as_ref(), &user, product_id, update).await;
    let resp = flash::report(&session, outcome).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Removed (no-op when absent)", body = ApiResponse<serde_json::Value>),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    session: Session,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let cart = state.cart_store(session.clone());
    let outcome = cart_service::remove_from_cart(cart.as_ref(), &user, product_id).await;
    let resp = flash::report(&session, outcome).await?;
    Ok(Json(resp))
}
