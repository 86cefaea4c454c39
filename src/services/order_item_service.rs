//! Order-item mutations and the total-price ledger invariant.
//!
//! Every create/update/delete locks the parent order row, applies the
//! mutation, and recomputes `orders.total_price` from the surviving line
//! totals inside the same transaction, so the stored total can never drift
//! from the sum of its items under concurrent edits.

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, ModelTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::order_items::{CreateOrderItemRequest, UpdateOrderItemRequest},
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::OrderItem,
    response::{ApiResponse, Meta},
    services::order_service::resolve_line_total,
    state::AppState,
};

pub async fn create_order_item(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderItemRequest,
) -> AppResult<ApiResponse<OrderItem>> {
    ensure_admin(user)?;
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    let order = lock_order(&txn, payload.order_id).await?;
    let line_total = resolve_line_total(&txn, payload.variant_id, payload.quantity).await?;

    let item = OrderItemActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        variant_id: Set(payload.variant_id),
        quantity: Set(payload.quantity),
        line_total: Set(line_total),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    recompute_total(&txn, order).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_item_create",
        Some("order_items"),
        Some(serde_json::json!({ "order_id": item.order_id, "order_item_id": item.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", item.into(), Some(Meta::empty())))
}

pub async fn update_order_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderItemRequest,
) -> AppResult<ApiResponse<OrderItem>> {
    ensure_admin(user)?;
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    let item = OrderItems::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let order = lock_order(&txn, item.order_id).await?;

    // Re-validate the variant link and refreeze the line total at the
    // product's current price.
    let line_total = resolve_line_total(&txn, item.variant_id, payload.quantity).await?;

    let mut active: OrderItemActive = item.into();
    active.quantity = Set(payload.quantity);
    active.line_total = Set(line_total);
    let item = active.update(&txn).await?;

    recompute_total(&txn, order).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_item_update",
        Some("order_items"),
        Some(serde_json::json!({ "order_item_id": item.id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", item.into(), Some(Meta::empty())))
}

/// Deleting the last item is legal: the order survives with a zero total.
pub async fn delete_order_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    let item = OrderItems::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let order = lock_order(&txn, item.order_id).await?;
    let order_item_id = item.id;

    item.delete(&txn).await?;

    recompute_total(&txn, order).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_item_delete",
        Some("order_items"),
        Some(serde_json::json!({ "order_item_id": order_item_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order item removed",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn lock_order(txn: &DatabaseTransaction, order_id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)
}

async fn recompute_total(txn: &DatabaseTransaction, order: OrderModel) -> AppResult<OrderModel> {
    let total: i64 = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(txn)
        .await?
        .iter()
        .map(|item| item.line_total)
        .sum();

    let mut active: OrderActive = order.into();
    active.total_price = Set(total);
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(txn).await?)
}
