pub mod auth;
pub mod booking;
pub mod error;
pub mod payment;
pub mod time_format;

pub use booking::*;
pub use payment::*;
