pub mod bookings;
pub mod checkout;
pub mod recovery;
