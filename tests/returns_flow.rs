mod common;

use axum_retail_api::{
    dto::orders::{CreateOrderRequest, NewOrderLine},
    dto::payments::CreatePaymentRequest,
    dto::returns::CreateReturnRequest,
    error::AppError,
    services::{order_service, payment_service, return_service},
};

use common::{create_user, seed_variant, try_setup_state};

#[tokio::test]
async fn confirming_a_return_deletes_the_order_and_its_records() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, "admin").await?;
    let customer = create_user(&state, "user").await?;
    let variant = seed_variant(&state, "Widget", 1000).await?;

    let order = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            user_id: customer.user_id,
            items: vec![NewOrderLine {
                variant_id: variant,
                quantity: 2,
            }],
        },
    )
    .await?
    .data
    .unwrap()
    .order;
    payment_service::create_payment(
        &state,
        &admin,
        CreatePaymentRequest {
            order_id: order.id,
            method: "cash".into(),
        },
    )
    .await?;

    let ret = return_service::create_return(
        &state,
        &customer,
        CreateReturnRequest {
            order_id: order.id,
            reason: "damaged on arrival".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(ret.status, "pending");

    let confirmed = return_service::update_return_status(&state, &admin, ret.id, "confirmed".into())
        .await?
        .data
        .unwrap();
    assert_eq!(confirmed.status, "confirmed");

    // The order and everything hanging off it are gone.
    let err = order_service::get_order(&state, &admin, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let items: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM order_items WHERE order_id = $1")
        .bind(order.id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(items.0, 0);
    let payments: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments WHERE order_id = $1")
        .bind(order.id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(payments.0, 0);

    // The return record itself survives as the trail of the deletion.
    let returns: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM returns WHERE id = $1 AND status = 'confirmed'")
            .bind(ret.id)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(returns.0, 1);

    // Terminal: no further transition is accepted.
    let err = return_service::update_return_status(&state, &admin, ret.id, "pending".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(msg) if msg == "return already confirmed"));
    Ok(())
}

#[tokio::test]
async fn non_terminal_status_updates_leave_the_order_alone() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, "admin").await?;
    let customer = create_user(&state, "user").await?;
    let variant = seed_variant(&state, "Widget", 1000).await?;

    let order = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            user_id: customer.user_id,
            items: vec![NewOrderLine {
                variant_id: variant,
                quantity: 1,
            }],
        },
    )
    .await?
    .data
    .unwrap()
    .order;

    let ret = return_service::create_return(
        &state,
        &customer,
        CreateReturnRequest {
            order_id: order.id,
            reason: "wrong size".into(),
        },
    )
    .await?
    .data
    .unwrap();

    let rejected = return_service::update_return_status(&state, &admin, ret.id, "rejected".into())
        .await?
        .data
        .unwrap();
    assert_eq!(rejected.status, "rejected");

    // The order is untouched by non-terminal transitions.
    let fetched = order_service::get_order(&state, &admin, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.order.id, order.id);
    Ok(())
}

#[tokio::test]
async fn returns_are_ownership_gated() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, "admin").await?;
    let customer = create_user(&state, "user").await?;
    let stranger = create_user(&state, "user").await?;
    let variant = seed_variant(&state, "Widget", 1000).await?;

    let order = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            user_id: customer.user_id,
            items: vec![NewOrderLine {
                variant_id: variant,
                quantity: 1,
            }],
        },
    )
    .await?
    .data
    .unwrap()
    .order;

    let err = return_service::create_return(
        &state,
        &stranger,
        CreateReturnRequest {
            order_id: order.id,
            reason: "not mine".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}
