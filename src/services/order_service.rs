use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    cart::CartStore,
    dto::orders::{OrderList, OrderWithItems},
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_owner_or_admin},
    models::{CartLine, Order, OrderItem, cart_total},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

pub const DEFAULT_ORDER_STATUS: &str = "pending";

pub async fn checkout(
    state: &AppState,
    cart: &dyn CartStore,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderWithItems>> {
    // Tokens outlive deleted accounts; orders must not be written for them.
    if Users::find_by_id(user.user_id).one(&state.orm).await?.is_none() {
        return Err(AppError::Unauthorized("Account no longer exists".into()));
    }

    let lines = cart.get(user.user_id).await?;
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }
    validate_cart_lines(&lines)?;

    let total_amount = cart_total(&lines);
    let created = create_order(
        &state.orm,
        user.user_id,
        &lines,
        total_amount,
        state.checkout_decrements_stock,
    )
    .await?;

    // The order is committed; a cart that fails to clear is only logged.
    if let Err(err) = cart.clear(user.user_id).await {
        tracing::warn!(
            error = %err,
            user_id = %user.user_id,
            order_id = %created.order.id,
            "order placed but cart was not cleared"
        );
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": created.order.id, "total": total_amount }),
    )
    .await;

    tracing::info!(
        user_id = %user.user_id,
        order_id = %created.order.id,
        items = created.items.len(),
        total = total_amount,
        "order placed"
    );

    Ok(ApiResponse::success(
        "Order placed successfully!",
        created,
        Some(Meta::empty()),
    ))
}

pub fn validate_cart_lines(lines: &[CartLine]) -> AppResult<()> {
    let corrupt = lines
        .iter()
        .find(|line| line.product_id.is_nil() || line.unit_price <= 0 || line.quantity <= 0);
    if let Some(line) = corrupt {
        tracing::error!(product_id = %line.product_id, "invalid cart line");
        return Err(AppError::InvalidCartData);
    }
    Ok(())
}

pub async fn create_order(
    orm: &DatabaseConnection,
    user_id: Uuid,
    lines: &[CartLine],
    total_amount: i64,
    decrement_stock: bool,
) -> AppResult<OrderWithItems> {
    let txn = orm.begin().await.map_err(AppError::CheckoutFailed)?;
    let now = Utc::now();

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total_amount: Set(total_amount),
        status: Set(DEFAULT_ORDER_STATUS.to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await
    .map_err(AppError::CheckoutFailed)?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for line in lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            product_name: Set(line.product_name.clone()),
            unit_price: Set(line.unit_price),
            quantity: Set(line.quantity),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(AppError::CheckoutFailed)?;
        items.push(OrderItem::from(item));

        if decrement_stock {
            // Conditional update: the row is only touched while enough stock remains.
            let updated = Products::update_many()
                .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
                .filter(
                    Condition::all()
                        .add(ProdCol::Id.eq(line.product_id))
                        .add(ProdCol::Stock.gte(line.quantity)),
                )
                .exec(&txn)
                .await
                .map_err(AppError::CheckoutFailed)?;
            if updated.rows_affected == 0 {
                return Err(AppError::InsufficientStock(line.product_id));
            }
        }
    }

    txn.commit().await.map_err(AppError::CheckoutFailed)?;

    Ok(OrderWithItems {
        order: Order::from(order),
        items,
    })
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let data = find_order_with_items(&state.orm, id)
        .await?
        .ok_or(AppError::NotFound)?;

    ensure_owner_or_admin(user, data.order.user_id)?;

    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn find_order_with_items<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> AppResult<Option<OrderWithItems>> {
    let Some(order) = Orders::find_by_id(id).one(conn).await? else {
        return Ok(None);
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    Ok(Some(OrderWithItems {
        order: Order::from(order),
        items,
    }))
}

pub async fn set_status(orm: &DatabaseConnection, id: Uuid, status: &str) -> AppResult<Order> {
    let status = status.trim();
    if status.is_empty() {
        return Err(AppError::Validation("Order status is required".into()));
    }

    let existing = Orders::find_by_id(id)
        .one(orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: OrderActive = existing.into();
    active.status = Set(status.to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(orm).await?;

    Ok(Order::from(order))
}

pub async fn delete_order(orm: &DatabaseConnection, id: Uuid) -> AppResult<()> {
    let txn = orm.begin().await?;

    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(id))
        .exec(&txn)
        .await?;

    let deleted = Orders::delete_by_id(id).exec(&txn).await?;
    if deleted.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    txn.commit().await?;
    Ok(())
}

