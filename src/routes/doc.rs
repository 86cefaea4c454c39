use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartLineDto, CartList, UpdateCartItemRequest},
        coupons::{ApplyCouponRequest, ApplyCouponResponse, SendCouponRequest},
        notifications::NotificationList,
        order_items::{CreateOrderItemRequest, UpdateOrderItemRequest},
        orders::{CheckoutRequest, CheckoutResponse, CreateOrderRequest, NewOrderLine, OrderList, OrderWithItems},
        payments::{
            ConfirmPaymentRequest, ConfirmPaymentResponse, CreatePaymentRequest,
            UpdatePaymentRequest, UpdatePaymentStatusRequest,
        },
        returns::{CreateReturnRequest, UpdateReturnStatusRequest},
    },
    models::{CartItem, Coupon, Notification, Order, OrderItem, Payment, Product, ReturnRequest, User, Variant},
    response::{ApiResponse, Meta},
    routes::{cart, coupons, health, notifications, order_items, orders, params, payments, returns},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        orders::list_orders,
        orders::create_order,
        orders::checkout,
        orders::get_order,
        order_items::create_order_item,
        order_items::update_order_item,
        order_items::delete_order_item,
        payments::create_payment,
        payments::update_payment,
        payments::update_payment_status,
        payments::confirm_payment,
        coupons::apply_coupon,
        coupons::send_coupon,
        returns::create_return,
        returns::update_return,
        notifications::list_notifications,
        notifications::notifications_ws
    ),
    components(
        schemas(
            User,
            Product,
            Variant,
            CartItem,
            Order,
            OrderItem,
            Payment,
            ReturnRequest,
            Coupon,
            Notification,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartLineDto,
            CartList,
            CheckoutRequest,
            CheckoutResponse,
            CreateOrderRequest,
            NewOrderLine,
            OrderList,
            OrderWithItems,
            CreateOrderItemRequest,
            UpdateOrderItemRequest,
            CreatePaymentRequest,
            UpdatePaymentRequest,
            UpdatePaymentStatusRequest,
            ConfirmPaymentRequest,
            ConfirmPaymentResponse,
            ApplyCouponRequest,
            ApplyCouponResponse,
            SendCouponRequest,
            CreateReturnRequest,
            UpdateReturnStatusRequest,
            NotificationList,
            params::Pagination,
            params::OrderListQuery,
            params::NotificationQuery,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<CartList>,
            ApiResponse<Payment>,
            ApiResponse<ConfirmPaymentResponse>,
            ApiResponse<ReturnRequest>,
            ApiResponse<NotificationList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Order Items", description = "Order ledger mutations"),
        (name = "Payments", description = "Payment records and gateway reconciliation"),
        (name = "Coupons", description = "Coupon validation and delivery"),
        (name = "Returns", description = "Return workflow"),
        (name = "Notifications", description = "Durable notifications and the live channel"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
