pub mod availability;

pub use availability::{available_slots, check_slot, day_status, working_grid, AvailabilityService};
