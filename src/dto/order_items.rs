use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

// Neither request carries a price: line totals are always recomputed from
// the variant's current product price.

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderItemRequest {
    pub order_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderItemRequest {
    pub quantity: i32,
}
