use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::payments::{
        ConfirmPaymentRequest, ConfirmPaymentResponse, CreatePaymentRequest, UpdatePaymentRequest,
        UpdatePaymentStatusRequest,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        orders::{ActiveModel as OrderActive, Entity as Orders},
        payments::{ActiveModel as PaymentActive, Entity as Payments},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Payment,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_COMPLETED: &str = "completed";

pub async fn create_payment(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    ensure_admin(user)?;
    if payload.method.trim().is_empty() {
        return Err(AppError::BadRequest("method is required".into()));
    }

    Orders::find_by_id(payload.order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(payload.order_id),
        method: Set(payload.method),
        status: Set(STATUS_PENDING.into()),
        transaction_ref: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Payment created",
        payment.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    ensure_admin(user)?;
    if payload.method.trim().is_empty() {
        return Err(AppError::BadRequest("method is required".into()));
    }

    let payment = Payments::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: PaymentActive = payment.into();
    active.method = Set(payload.method);
    active.updated_at = Set(Utc::now().into());
    let payment = active.update(&state.orm).await?;

    Ok(ApiResponse::success("OK", payment.into(), Some(Meta::empty())))
}

/// Manual settlement lever: forcing a payment to `completed` also forces
/// the parent order to `paid`, in the same transaction. This is the only
/// modeled way to settle a cash payment.
pub async fn update_payment_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentStatusRequest,
) -> AppResult<ApiResponse<Payment>> {
    ensure_admin(user)?;
    if payload.status != STATUS_PENDING && payload.status != STATUS_COMPLETED {
        return Err(AppError::BadRequest(format!(
            "unknown payment status: {}",
            payload.status
        )));
    }

    let txn = state.orm.begin().await?;

    let payment = Payments::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let order_id = payment.order_id;

    let mut active: PaymentActive = payment.into();
    active.status = Set(payload.status.clone());
    active.updated_at = Set(Utc::now().into());
    let payment = active.update(&txn).await?;

    if payload.status == STATUS_COMPLETED {
        let order = Orders::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;
        let mut order: OrderActive = order.into();
        order.status = Set("paid".into());
        order.updated_at = Set(Utc::now().into());
        order.update(&txn).await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_status_update",
        Some("payments"),
        Some(serde_json::json!({ "payment_id": payment.id, "status": payload.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", payment.into(), Some(Meta::empty())))
}

/// Reconcile a gateway session back into local state.
///
/// The session's metadata carries the full `{order, payment, owner}`
/// context, so this call is stateless with respect to the caller. An
/// unsettled session changes nothing. A payment that is already completed
/// short-circuits: the second confirmation returns success without
/// touching the cart or re-publishing the notification.
pub async fn confirm(
    state: &AppState,
    user: &AuthUser,
    payload: ConfirmPaymentRequest,
) -> AppResult<ApiResponse<ConfirmPaymentResponse>> {
    let session = state.gateway.fetch_session(&payload.session_id).await?;
    if !session.is_settled() {
        return Err(AppError::Gateway("payment not completed".into()));
    }
    let meta = session.metadata()?;

    let txn = state.orm.begin().await?;

    let payment = Payments::find_by_id(meta.payment_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let order = Orders::find_by_id(meta.order_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if payment.status == STATUS_COMPLETED {
        txn.commit().await?;
        return Ok(ApiResponse::success(
            "Payment already settled",
            ConfirmPaymentResponse {
                order: order.into(),
                payment: payment.into(),
                newly_settled: false,
            },
            Some(Meta::empty()),
        ));
    }

    let mut pay_active: PaymentActive = payment.into();
    pay_active.status = Set(STATUS_COMPLETED.into());
    pay_active.transaction_ref = Set(session.transaction_ref.clone());
    pay_active.updated_at = Set(Utc::now().into());
    let payment = pay_active.update(&txn).await?;

    let mut order_active: OrderActive = order.into();
    order_active.status = Set("paid".into());
    order_active.updated_at = Set(Utc::now().into());
    let order = order_active.update(&txn).await?;

    // Settlement clears the owner's whole cart, per the gateway contract.
    CartItems::delete_many()
        .filter(CartCol::UserId.eq(meta.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_confirm",
        Some("payments"),
        Some(serde_json::json!({
            "payment_id": payment.id,
            "order_id": order.id,
            "session_id": payload.session_id,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let message = format!("Payment received, order {} is now paid", order.id);
    if let Err(err) = state.bus.publish(&state.pool, meta.user_id, &message).await {
        tracing::warn!(error = %err, "payment notification failed");
    }

    Ok(ApiResponse::success(
        "Payment confirmed",
        ConfirmPaymentResponse {
            order: order.into(),
            payment: payment.into(),
            newly_settled: true,
        },
        Some(Meta::empty()),
    ))
}
