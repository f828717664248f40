//! API Routes

pub mod health;
pub mod packages;
pub mod payments;
pub mod reconnect;
pub mod sessions;
pub mod vouchers;
