pub mod booking;
pub mod links;
pub mod quota;

pub use booking::BookingService;
pub use links::{parse_token, LinkService};
pub use quota::QuotaTracker;
