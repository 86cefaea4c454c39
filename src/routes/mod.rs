use axum::Router;

use crate::state::AppState;

pub mod cart;
pub mod coupons;
pub mod doc;
pub mod health;
pub mod notifications;
pub mod order_items;
pub mod orders;
pub mod params;
pub mod payments;
pub mod returns;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/order-items", order_items::router())
        .nest("/payments", payments::router())
        .nest("/coupons", coupons::router())
        .nest("/returns", returns::router())
        .nest("/notifications", notifications::router())
}
