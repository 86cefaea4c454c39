use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::coupons::{ApplyCouponRequest, ApplyCouponResponse, SendCouponRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Notification,
    response::ApiResponse,
    services::coupon_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/apply-coupon", post(apply_coupon))
        .route("/send-coupon", post(send_coupon))
}

#[utoipa::path(
    post,
    path = "/api/coupons/apply-coupon",
    request_body = ApplyCouponRequest,
    responses(
        (status = 200, description = "Validate a coupon code", body = ApiResponse<ApplyCouponResponse>),
        (status = 400, description = "Coupon has expired"),
        (status = 404, description = "Unknown code"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn apply_coupon(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<ApplyCouponRequest>,
) -> AppResult<Json<ApiResponse<ApplyCouponResponse>>> {
    let resp = coupon_service::apply_coupon(&state.pool, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/coupons/send-coupon",
    request_body = SendCouponRequest,
    responses(
        (status = 200, description = "Notify a user about a coupon (admin only)", body = ApiResponse<Notification>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User or coupon not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn send_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SendCouponRequest>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let resp = coupon_service::send_coupon(&state, &user, payload).await?;
    Ok(Json(resp))
}
