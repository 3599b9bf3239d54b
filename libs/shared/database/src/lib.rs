pub mod store;
pub mod supabase;
pub mod supabase_store;

pub use store::{BookingStore, StoreError, StoreResult};
pub use supabase::{SupabaseClient, SupabaseError};
pub use supabase_store::SupabaseStore;
