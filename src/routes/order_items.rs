use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{post, put},
};
use uuid::Uuid;

use crate::{
    dto::order_items::{CreateOrderItemRequest, UpdateOrderItemRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::OrderItem,
    response::ApiResponse,
    services::order_item_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order_item))
        .route("/{id}", put(update_order_item).delete(delete_order_item))
}

#[utoipa::path(
    post,
    path = "/api/order-items",
    request_body = CreateOrderItemRequest,
    responses(
        (status = 200, description = "Add an item to an order; the order total is recomputed", body = ApiResponse<OrderItem>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order or variant not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Order Items"
)]
pub async fn create_order_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderItemRequest>,
) -> AppResult<Json<ApiResponse<OrderItem>>> {
    let resp = order_item_service::create_order_item(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/order-items/{id}",
    params(
        ("id" = Uuid, Path, description = "Order item ID")
    ),
    request_body = UpdateOrderItemRequest,
    responses(
        (status = 200, description = "Update an item; the line total and order total are recomputed", body = ApiResponse<OrderItem>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Order Items"
)]
pub async fn update_order_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderItemRequest>,
) -> AppResult<Json<ApiResponse<OrderItem>>> {
    let resp = order_item_service::update_order_item(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/order-items/{id}",
    params(
        ("id" = Uuid, Path, description = "Order item ID")
    ),
    responses(
        (status = 200, description = "Remove an item; the order survives with a recomputed total", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Order Items"
)]
pub async fn delete_order_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = order_item_service::delete_order_item(&state, &user, id).await?;
    Ok(Json(resp))
}
