use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CheckoutRequest, CheckoutResponse, CreateOrderRequest, OrderList, OrderWithItems,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        payments::ActiveModel as PaymentActive,
        product_variants::Entity as ProductVariants,
        products::Entity as Products,
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    gateway::{NewGatewaySession, SessionMetadata},
    middleware::auth::{AuthUser, ensure_admin, ensure_owner_or_admin},
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

pub const METHOD_CASH: &str = "cash";

/// Turn the caller's cart into an order, its items, and a pending payment,
/// all inside one transaction. The cart rows are read under a row lock and
/// consumed before commit, so two concurrent checkouts cannot both claim
/// the same cart and neither payment path leaves the cart behind.
///
/// For gateway-settled methods the redirect session is created before the
/// transaction commits: a gateway failure aborts the whole checkout and the
/// cart stays intact.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    if payload.payment_method.trim().is_empty() {
        return Err(AppError::BadRequest("payment_method is required".into()));
    }

    let txn = state.orm.begin().await?;

    Users::find_by_id(user.user_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let cart_rows = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    if cart_rows.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let mut total_price: i64 = 0;
    let mut lines: Vec<(Uuid, i32, i64)> = Vec::with_capacity(cart_rows.len());
    for row in &cart_rows {
        if row.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        let line_total = resolve_line_total(&txn, row.variant_id, row.quantity).await?;
        total_price += line_total;
        lines.push((row.variant_id, row.quantity, line_total));
    }

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_price: Set(total_price),
        status: Set("pending".into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for (variant_id, quantity, line_total) in lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            variant_id: Set(variant_id),
            quantity: Set(quantity),
            line_total: Set(line_total),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(item.into());
    }

    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        method: Set(payload.payment_method.clone()),
        status: Set("pending".into()),
        transaction_ref: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    // Consume the cart as part of the same unit of work.
    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    let redirect_url = if payload.payment_method == METHOD_CASH {
        None
    } else {
        let session = state
            .gateway
            .create_session(NewGatewaySession {
                amount: total_price,
                metadata: SessionMetadata {
                    order_id: order.id,
                    payment_id: payment.id,
                    user_id: user.user_id,
                },
            })
            .await?;
        Some(session.redirect_url)
    };

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "payment_id": payment.id,
            "method": payload.payment_method,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout success",
        CheckoutResponse {
            order: order.into(),
            items,
            payment: payment.into(),
            redirect_url,
        },
        Some(Meta::empty()),
    ))
}

/// Admin/manual order creation, bypassing the cart. Line totals are still
/// resolved from the referenced variants, never from the request.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;

    if payload.items.is_empty() {
        return Err(AppError::BadRequest("order needs at least one item".into()));
    }

    let txn = state.orm.begin().await?;

    Users::find_by_id(payload.user_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut total_price: i64 = 0;
    let mut lines: Vec<(Uuid, i32, i64)> = Vec::with_capacity(payload.items.len());
    for line in &payload.items {
        if line.quantity <= 0 {
            return Err(AppError::BadRequest(
                "quantity must be greater than 0".into(),
            ));
        }
        let line_total = resolve_line_total(&txn, line.variant_id, line.quantity).await?;
        total_price += line_total;
        lines.push((line.variant_id, line.quantity, line_total));
    }

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(payload.user_id),
        total_price: Set(total_price),
        status: Set("pending".into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for (variant_id, quantity, line_total) in lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            variant_id: Set(variant_id),
            quantity: Set(quantity),
            line_total: Set(line_total),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(item.into());
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "user_id": payload.user_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: order.into(),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
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
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner_or_admin(user, order.user_id)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order.into(),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Resolve a variant through its parent product and freeze the line total.
/// Fails with NotFound when either side of the link is gone.
pub(crate) async fn resolve_line_total(
    txn: &DatabaseTransaction,
    variant_id: Uuid,
    quantity: i32,
) -> AppResult<i64> {
    let variant = ProductVariants::find_by_id(variant_id)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let product = Products::find_by_id(variant.product_id)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(product.base_price * quantity as i64)
}
