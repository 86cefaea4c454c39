mod common;

use axum_retail_api::{
    dto::order_items::{CreateOrderItemRequest, UpdateOrderItemRequest},
    dto::orders::{CreateOrderRequest, NewOrderLine},
    error::AppError,
    middleware::auth::AuthUser,
    services::{order_item_service, order_service},
    state::AppState,
};
use uuid::Uuid;

use common::{create_user, seed_variant, try_setup_state};

async fn order_total(state: &AppState, admin: &AuthUser, order_id: Uuid) -> anyhow::Result<i64> {
    let resp = order_service::get_order(state, admin, order_id).await?;
    let data = resp.data.unwrap();
    let item_sum: i64 = data.items.iter().map(|i| i.line_total).sum();
    // The ledger invariant itself: stored total equals the item sum.
    assert_eq!(data.order.total_price, item_sum);
    Ok(data.order.total_price)
}

#[tokio::test]
async fn every_item_mutation_recomputes_the_order_total() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, "admin").await?;
    let customer = create_user(&state, "user").await?;
    let variant_a = seed_variant(&state, "Widget", 1000).await?;
    let variant_b = seed_variant(&state, "Gadget", 2500).await?;

    let created = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            user_id: customer.user_id,
            items: vec![NewOrderLine {
                variant_id: variant_a,
                quantity: 2,
            }],
        },
    )
    .await?
    .data
    .unwrap();
    let order_id = created.order.id;
    assert_eq!(order_total(&state, &admin, order_id).await?, 2000);

    // Create: total grows by the new frozen line.
    let added = order_item_service::create_order_item(
        &state,
        &admin,
        CreateOrderItemRequest {
            order_id,
            variant_id: variant_b,
            quantity: 1,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(added.line_total, 2500);
    assert_eq!(order_total(&state, &admin, order_id).await?, 4500);

    // Update: the line total is refrozen server-side from price x quantity.
    let updated = order_item_service::update_order_item(
        &state,
        &admin,
        added.id,
        UpdateOrderItemRequest { quantity: 3 },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.line_total, 7500);
    assert_eq!(order_total(&state, &admin, order_id).await?, 9500);

    // Delete: the total shrinks accordingly.
    order_item_service::delete_order_item(&state, &admin, updated.id).await?;
    assert_eq!(order_total(&state, &admin, order_id).await?, 2000);

    // Deleting the final item leaves an empty order, not a deleted one.
    let remaining = order_service::get_order(&state, &admin, order_id)
        .await?
        .data
        .unwrap();
    let last_item = remaining.items.first().unwrap().id;
    order_item_service::delete_order_item(&state, &admin, last_item).await?;
    assert_eq!(order_total(&state, &admin, order_id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn item_mutations_reject_missing_orders_and_variants() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, "admin").await?;
    let variant = seed_variant(&state, "Widget", 1000).await?;

    let err = order_item_service::create_order_item(
        &state,
        &admin,
        CreateOrderItemRequest {
            order_id: Uuid::new_v4(),
            variant_id: variant,
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let customer = create_user(&state, "user").await?;
    let created = order_service::create_order(
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
    .unwrap();

    let err = order_item_service::create_order_item(
        &state,
        &admin,
        CreateOrderItemRequest {
            order_id: created.order.id,
            variant_id: Uuid::new_v4(),
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn order_mutations_are_gated_to_admins() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, "user").await?;
    let variant = seed_variant(&state, "Widget", 1000).await?;

    let err = order_service::create_order(
        &state,
        &user,
        CreateOrderRequest {
            user_id: user.user_id,
            items: vec![NewOrderLine {
                variant_id: variant,
                quantity: 1,
            }],
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}
