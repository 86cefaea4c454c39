use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::returns::CreateReturnRequest,
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::Entity as Orders,
        payments::{Column as PaymentCol, Entity as Payments},
        returns::{ActiveModel as ReturnActive, Entity as Returns},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_owner_or_admin},
    models::ReturnRequest,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CONFIRMED: &str = "confirmed";

pub async fn create_return(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReturnRequest,
) -> AppResult<ApiResponse<ReturnRequest>> {
    if payload.reason.trim().is_empty() {
        return Err(AppError::BadRequest("reason is required".into()));
    }

    let order = Orders::find_by_id(payload.order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner_or_admin(user, order.user_id)?;

    let ret = ReturnActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        reason: Set(payload.reason),
        status: Set(STATUS_PENDING.into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "return_create",
        Some("returns"),
        Some(serde_json::json!({ "return_id": ret.id, "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Return created",
        ret.into(),
        Some(Meta::empty()),
    ))
}

/// Non-terminal status changes: persist and nothing else. A request for
/// `confirmed` must go through [`confirm_return`], whose destructive
/// consequence is part of its contract.
pub async fn update_return_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    status: String,
) -> AppResult<ApiResponse<ReturnRequest>> {
    ensure_admin(user)?;
    if status.trim().is_empty() {
        return Err(AppError::BadRequest("status is required".into()));
    }
    if status == STATUS_CONFIRMED {
        return confirm_return(state, user, id).await;
    }

    let ret = Returns::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if ret.status == STATUS_CONFIRMED {
        return Err(AppError::BadRequest("return already confirmed".into()));
    }

    let mut active: ReturnActive = ret.into();
    active.status = Set(status.clone());
    active.updated_at = Set(Utc::now().into());
    let ret = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "return_status_update",
        Some("returns"),
        Some(serde_json::json!({ "return_id": ret.id, "status": status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", ret.into(), Some(Meta::empty())))
}

/// Terminal, destructive transition: confirming a return permanently
/// deletes the associated order together with its items and payments.
/// The return record itself survives as the trail of that deletion.
pub async fn confirm_return(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<ReturnRequest>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    let ret = Returns::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    if ret.status == STATUS_CONFIRMED {
        return Err(AppError::BadRequest("return already confirmed".into()));
    }

    let order = Orders::find_by_id(ret.order_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let order_id = order.id;

    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .exec(&txn)
        .await?;
    Payments::delete_many()
        .filter(PaymentCol::OrderId.eq(order_id))
        .exec(&txn)
        .await?;
    order.delete(&txn).await?;

    let mut active: ReturnActive = ret.into();
    active.status = Set(STATUS_CONFIRMED.into());
    active.updated_at = Set(Utc::now().into());
    let ret = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "return_confirm",
        Some("returns"),
        Some(serde_json::json!({ "return_id": ret.id, "order_id": order_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Return confirmed",
        ret.into(),
        Some(Meta::empty()),
    ))
}
