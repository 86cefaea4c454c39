use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::coupons::{ApplyCouponRequest, ApplyCouponResponse, SendCouponRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Coupon, Notification},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Validate a discount code. Read-only: coupons carry no usage tracking,
/// so the same code validates any number of times.
pub async fn apply_coupon(
    pool: &DbPool,
    payload: ApplyCouponRequest,
) -> AppResult<ApiResponse<ApplyCouponResponse>> {
    let coupon: Option<Coupon> = sqlx::query_as("SELECT * FROM coupons WHERE code = $1")
        .bind(&payload.coupon_code)
        .fetch_optional(pool)
        .await?;
    let coupon = coupon.ok_or(AppError::NotFound)?;

    ensure_not_expired(&coupon, Utc::now())?;

    Ok(ApiResponse::success(
        "Coupon valid",
        ApplyCouponResponse {
            kind: coupon.kind,
            discount_amount: coupon.amount,
        },
        Some(Meta::empty()),
    ))
}

/// Notify a user about a coupon. Does not mark the coupon claimed.
pub async fn send_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: SendCouponRequest,
) -> AppResult<ApiResponse<Notification>> {
    ensure_admin(user)?;

    let recipient: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(payload.user_id)
        .fetch_optional(&state.pool)
        .await?;
    if recipient.is_none() {
        return Err(AppError::NotFound);
    }

    let coupon: Option<Coupon> = sqlx::query_as("SELECT * FROM coupons WHERE id = $1")
        .bind(payload.coupon_id)
        .fetch_optional(&state.pool)
        .await?;
    let coupon = coupon.ok_or(AppError::NotFound)?;

    let message = format!(
        "You received coupon {}: {} off",
        coupon.code,
        describe_discount(&coupon)
    );
    let notification = state
        .bus
        .publish(&state.pool, payload.user_id, &message)
        .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "coupon_send",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": coupon.id, "user_id": payload.user_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Coupon sent",
        notification,
        Some(Meta::empty()),
    ))
}

fn ensure_not_expired(coupon: &Coupon, now: DateTime<Utc>) -> AppResult<()> {
    if let Some(expires_at) = coupon.expires_at {
        if expires_at < now {
            return Err(AppError::BadRequest("coupon has expired".into()));
        }
    }
    Ok(())
}

fn describe_discount(coupon: &Coupon) -> String {
    match coupon.kind.as_str() {
        "percent" => format!("{}%", coupon.amount),
        _ => coupon.amount.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(expires_at: Option<DateTime<Utc>>) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: "SAVE10".into(),
            kind: "fixed".into(),
            amount: 1000,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn coupon_without_expiry_is_valid() {
        assert!(ensure_not_expired(&coupon(None), Utc::now()).is_ok());
    }

    #[test]
    fn future_expiry_is_valid() {
        let now = Utc::now();
        assert!(ensure_not_expired(&coupon(Some(now + Duration::days(1))), now).is_ok());
    }

    #[test]
    fn past_expiry_is_a_validation_error() {
        let now = Utc::now();
        let err = ensure_not_expired(&coupon(Some(now - Duration::days(1))), now).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "coupon has expired"));
    }

    #[test]
    fn percent_coupons_describe_their_rate() {
        let mut c = coupon(None);
        c.kind = "percent".into();
        c.amount = 15;
        assert_eq!(describe_discount(&c), "15%");
        assert_eq!(describe_discount(&coupon(None)), "1000");
    }
}
