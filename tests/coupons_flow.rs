mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use axum_retail_api::{
    dto::coupons::{ApplyCouponRequest, SendCouponRequest},
    error::AppError,
    services::coupon_service,
    state::AppState,
};

use common::{create_user, notifications_for, try_setup_state};

async fn seed_coupon(
    state: &AppState,
    kind: &str,
    amount: i64,
    expires_at: Option<chrono::DateTime<Utc>>,
) -> anyhow::Result<(Uuid, String)> {
    let id = Uuid::new_v4();
    let code = format!("CODE-{id}");
    sqlx::query("INSERT INTO coupons (id, code, kind, amount, expires_at) VALUES ($1, $2, $3, $4, $5)")
        .bind(id)
        .bind(&code)
        .bind(kind)
        .bind(amount)
        .bind(expires_at)
        .execute(&state.pool)
        .await?;
    Ok((id, code))
}

#[tokio::test]
async fn applying_a_valid_coupon_returns_its_discount() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let (_, code) = seed_coupon(&state, "fixed", 5000, Some(Utc::now() + Duration::days(7))).await?;

    let resp = coupon_service::apply_coupon(&state.pool, ApplyCouponRequest { coupon_code: code })
        .await?
        .data
        .unwrap();
    assert_eq!(resp.kind, "fixed");
    assert_eq!(resp.discount_amount, 5000);
    Ok(())
}

#[tokio::test]
async fn expired_coupons_are_rejected_without_a_discount() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let (_, code) = seed_coupon(&state, "fixed", 5000, Some(Utc::now() - Duration::days(1))).await?;

    let err = coupon_service::apply_coupon(&state.pool, ApplyCouponRequest { coupon_code: code })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(msg) if msg == "coupon has expired"));
    Ok(())
}

#[tokio::test]
async fn unknown_codes_are_not_found() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let err = coupon_service::apply_coupon(
        &state.pool,
        ApplyCouponRequest {
            coupon_code: format!("CODE-{}", Uuid::new_v4()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn coupons_are_not_consumed_by_validation() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let (_, code) = seed_coupon(&state, "percent", 10, None).await?;

    for _ in 0..3 {
        let resp = coupon_service::apply_coupon(
            &state.pool,
            ApplyCouponRequest {
                coupon_code: code.clone(),
            },
        )
        .await?
        .data
        .unwrap();
        assert_eq!(resp.discount_amount, 10);
    }
    Ok(())
}

#[tokio::test]
async fn sending_a_coupon_notifies_the_owner() -> anyhow::Result<()> {
    let Some((state, _gateway)) = try_setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, "admin").await?;
    let customer = create_user(&state, "user").await?;
    let (coupon_id, code) = seed_coupon(&state, "fixed", 2500, None).await?;

    let notification = coupon_service::send_coupon(
        &state,
        &admin,
        SendCouponRequest {
            user_id: customer.user_id,
            coupon_id,
        },
    )
    .await?
    .data
    .unwrap();
    assert!(notification.message.contains(&code));
    assert!(!notification.is_read);

    let stored = notifications_for(&state, customer.user_id, "You received coupon").await?;
    assert_eq!(stored.len(), 1);

    // Non-admins cannot send coupons.
    let err = coupon_service::send_coupon(
        &state,
        &customer,
        SendCouponRequest {
            user_id: customer.user_id,
            coupon_id,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}
