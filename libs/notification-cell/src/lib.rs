pub mod models;
pub mod services;
pub mod test_utils;

pub use models::*;
pub use services::*;
