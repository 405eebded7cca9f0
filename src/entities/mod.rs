pub mod booking;
pub mod customer;
pub mod payment;
pub mod rate_limit;

pub use booking::BookingStatus;
pub use payment::{PaymentProviderKind, PaymentStatus};
