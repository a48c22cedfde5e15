// storefront/src/models/mod.rs

//! Domain records and request payloads.

pub mod cart;
pub mod coupon;
pub mod notification;
pub mod order;
pub mod product;
pub mod transaction;
pub mod user;

pub use cart::{Cart, LineItem};
pub use coupon::{Coupon, CouponDraft, CouponRejection, CouponSummary, DiscountQuote, DiscountType};
pub use notification::{DeliveryState, NotificationKind, NotificationPayload, OutboxMessage};
pub use order::{Order, OrderStatus, OrderStatusUpdate, OrderSubmission};
pub use product::{Product, ProductDraft, ProductFilter, ProductPatch};
pub use transaction::{Transaction, TransactionStatus};
pub use user::{User, UserRole};
