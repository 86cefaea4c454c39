use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyCouponRequest {
    pub coupon_code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplyCouponResponse {
    pub kind: String,
    pub discount_amount: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendCouponRequest {
    pub user_id: Uuid,
    pub coupon_id: Uuid,
}
