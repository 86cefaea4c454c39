pub mod audit_logs;
pub mod cart_items;
pub mod coupons;
pub mod notifications;
pub mod order_items;
pub mod orders;
pub mod payments;
pub mod product_variants;
pub mod products;
pub mod returns;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use coupons::Entity as Coupons;
pub use notifications::Entity as Notifications;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use product_variants::Entity as ProductVariants;
pub use products::Entity as Products;
pub use returns::Entity as Returns;
pub use users::Entity as Users;
