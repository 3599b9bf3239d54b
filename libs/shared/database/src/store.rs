use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentStatus, BusinessProfile, GatewayConnection, OneTimeLink,
    PaymentIntent, PaymentStatus, UsageProfile,
};

use crate::supabase::SupabaseError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Malformed record: {0}")]
    Decode(String),
}

impl From<SupabaseError> for StoreError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::Conflict(body) => StoreError::UniqueViolation(body),
            SupabaseError::NotFound(body) => StoreError::NotFound(body),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam for the booking and payment flows.
///
/// Every mutation that guards an invariant is a single conditional write in
/// the backing store: `insert_appointment` relies on the active-slot unique
/// index, `consume_link` and `transition_appointment` are conditional
/// updates, and `reserve_usage` checks the ceiling and increments in one
/// statement. Callers never read-then-write to enforce those invariants.
#[async_trait]
pub trait BookingStore: Send + Sync {
    // Professional configuration
    async fn get_business_profile(&self, professional_id: Uuid) -> StoreResult<Option<BusinessProfile>>;
    async fn get_gateway_connection(&self, professional_id: Uuid) -> StoreResult<Option<GatewayConnection>>;

    // One-time links
    async fn insert_link(&self, link: &OneTimeLink) -> StoreResult<OneTimeLink>;
    async fn get_link(&self, token: Uuid) -> StoreResult<Option<OneTimeLink>>;
    /// Flips `is_used` from false to true and records the appointment.
    /// Returns `false` when the link was already used.
    async fn consume_link(&self, token: Uuid, appointment_id: Uuid) -> StoreResult<bool>;

    // Appointments
    /// Fails with `UniqueViolation` when a non-cancelled appointment already
    /// holds the same (professional, date, time).
    async fn insert_appointment(&self, appointment: &Appointment) -> StoreResult<Appointment>;
    async fn delete_appointment(&self, appointment_id: Uuid) -> StoreResult<()>;
    async fn get_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Appointment>>;
    async fn find_active_appointment(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<Option<Appointment>>;
    async fn booked_times(&self, professional_id: Uuid, date: NaiveDate) -> StoreResult<Vec<NaiveTime>>;
    async fn list_appointments(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Appointment>>;
    /// Sets `to` only if the current status is one of `allowed_from`.
    /// Returns `None` when no row matched.
    async fn transition_appointment(
        &self,
        appointment_id: Uuid,
        to: AppointmentStatus,
        allowed_from: &[AppointmentStatus],
    ) -> StoreResult<Option<Appointment>>;

    // Usage quota
    async fn get_usage_profile(&self, professional_id: Uuid) -> StoreResult<Option<UsageProfile>>;
    /// Counts one booking for `today`, rolling the counter over when the
    /// stored date differs. Returns `None` without counting when a trial
    /// professional already has `trial_limit` bookings today.
    async fn reserve_usage(
        &self,
        professional_id: Uuid,
        today: NaiveDate,
        trial_limit: i32,
    ) -> StoreResult<Option<UsageProfile>>;
    /// Gives back one booking counted for `today`.
    async fn release_usage(&self, professional_id: Uuid, today: NaiveDate) -> StoreResult<()>;
    async fn revert_premium(&self, professional_id: Uuid) -> StoreResult<()>;

    // Payment intents
    async fn insert_payment_intent(&self, intent: &PaymentIntent) -> StoreResult<PaymentIntent>;
    async fn get_payment_intent(&self, payment_id: &str) -> StoreResult<Option<PaymentIntent>>;
    async fn get_payment_intent_for_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<PaymentIntent>>;
    async fn update_payment_status(&self, payment_id: &str, status: PaymentStatus) -> StoreResult<()>;
}
