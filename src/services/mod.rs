pub mod cart_service;
pub mod coupon_service;
pub mod order_item_service;
pub mod order_service;
pub mod payment_service;
pub mod return_service;
