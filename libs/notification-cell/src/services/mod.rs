pub mod fanout;
pub mod supabase;

pub use fanout::{announce_booking, announce_payment_received, Notifier};
pub use supabase::SupabaseNotifier;
