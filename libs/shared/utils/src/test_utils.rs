use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{BookingStore, StoreError, StoreResult};
use shared_models::auth::User;
use shared_models::{
    Appointment, AppointmentStatus, BusinessProfile, GatewayConnection, OneTimeLink,
    PaymentIntent, PaymentStatus, Plan, UsageProfile,
};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub mercadopago_api_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            mercadopago_api_url: "http://localhost:54322".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            mercadopago_api_url: self.mercadopago_api_url.clone(),
            payment_notification_url: None,
            push_function_path: "/functions/v1/send-push".to_string(),
            http_timeout_secs: 5,
            business_utc_offset_minutes: -180,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::professional("professional@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn professional(email: &str) -> Self {
        Self::new(email, "authenticated")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.to_string(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

#[derive(Default)]
struct StoreState {
    profiles: HashMap<Uuid, BusinessProfile>,
    connections: HashMap<Uuid, GatewayConnection>,
    links: HashMap<Uuid, OneTimeLink>,
    appointments: HashMap<Uuid, Appointment>,
    usage: HashMap<Uuid, UsageProfile>,
    intents: HashMap<String, PaymentIntent>,
}

/// `BookingStore` held in process memory. Each operation runs under one lock,
/// which gives it the same atomicity the database provides for the matching
/// conditional statement.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    simulate_link_race: AtomicBool,
    lose_consume_response: AtomicBool,
    fail_link_lookup: AtomicBool,
    fail_usage_reservation: AtomicBool,
    fail_next_transition: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("in-memory store lock poisoned")
    }

    /// The next `consume_link` behaves as if a concurrent request consumed
    /// the link first.
    pub fn simulate_link_race(&self) {
        self.simulate_link_race.store(true, Ordering::SeqCst);
    }

    /// The next `consume_link` commits and then reports an error, as when
    /// the response is lost after the database applied the update.
    pub fn lose_consume_response(&self) {
        self.lose_consume_response.store(true, Ordering::SeqCst);
    }

    pub fn fail_link_lookup(&self) {
        self.fail_link_lookup.store(true, Ordering::SeqCst);
    }

    pub fn fail_usage_reservation(&self) {
        self.fail_usage_reservation.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_transition(&self) {
        self.fail_next_transition.store(true, Ordering::SeqCst);
    }

    pub fn put_business_profile(&self, profile: BusinessProfile) {
        self.state().profiles.insert(profile.professional_id, profile);
    }

    pub fn put_gateway_connection(&self, connection: GatewayConnection) {
        self.state().connections.insert(connection.professional_id, connection);
    }

    pub fn remove_gateway_connection(&self, professional_id: Uuid) {
        self.state().connections.remove(&professional_id);
    }

    pub fn put_usage_profile(&self, usage: UsageProfile) {
        self.state().usage.insert(usage.professional_id, usage);
    }

    pub fn put_link(&self, link: OneTimeLink) {
        self.state().links.insert(link.id, link);
    }

    pub fn put_appointment(&self, appointment: Appointment) {
        self.state().appointments.insert(appointment.id, appointment);
    }

    pub fn put_payment_intent(&self, intent: PaymentIntent) {
        self.state().intents.insert(intent.id.clone(), intent);
    }

    pub fn link(&self, token: Uuid) -> Option<OneTimeLink> {
        self.state().links.get(&token).cloned()
    }

    pub fn appointment(&self, appointment_id: Uuid) -> Option<Appointment> {
        self.state().appointments.get(&appointment_id).cloned()
    }

    pub fn appointments_for(&self, professional_id: Uuid) -> Vec<Appointment> {
        let mut list: Vec<Appointment> = self.state().appointments.values()
            .filter(|a| a.professional_id == professional_id)
            .cloned()
            .collect();
        list.sort_by_key(|a| (a.date, a.time));
        list
    }

    pub fn usage(&self, professional_id: Uuid) -> Option<UsageProfile> {
        self.state().usage.get(&professional_id).cloned()
    }

    pub fn payment_intents(&self) -> Vec<PaymentIntent> {
        self.state().intents.values().cloned().collect()
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn get_business_profile(&self, professional_id: Uuid) -> StoreResult<Option<BusinessProfile>> {
        Ok(self.state().profiles.get(&professional_id).cloned())
    }

    async fn get_gateway_connection(&self, professional_id: Uuid) -> StoreResult<Option<GatewayConnection>> {
        Ok(self.state().connections.get(&professional_id).cloned())
    }

    async fn insert_link(&self, link: &OneTimeLink) -> StoreResult<OneTimeLink> {
        let mut state = self.state();
        if state.links.contains_key(&link.id) {
            return Err(StoreError::UniqueViolation(format!("link {}", link.id)));
        }
        state.links.insert(link.id, link.clone());
        Ok(link.clone())
    }

    async fn get_link(&self, token: Uuid) -> StoreResult<Option<OneTimeLink>> {
        if self.fail_link_lookup.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("link lookup unavailable".to_string()));
        }
        Ok(self.state().links.get(&token).cloned())
    }

    async fn consume_link(&self, token: Uuid, appointment_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state();
        let Some(link) = state.links.get_mut(&token) else {
            return Ok(false);
        };

        if self.simulate_link_race.swap(false, Ordering::SeqCst) {
            link.is_used = true;
            link.appointment_id = Some(Uuid::new_v4());
            return Ok(false);
        }

        if link.is_used {
            return Ok(false);
        }
        link.is_used = true;
        link.appointment_id = Some(appointment_id);

        if self.lose_consume_response.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("timeout".to_string()));
        }
        Ok(true)
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> StoreResult<Appointment> {
        let mut state = self.state();
        let taken = state.appointments.values().any(|existing| {
            existing.professional_id == appointment.professional_id
                && existing.date == appointment.date
                && existing.time == appointment.time
                && existing.status.occupies_slot()
        });

        if taken && appointment.status.occupies_slot() {
            return Err(StoreError::UniqueViolation("appointments_active_slot_key".to_string()));
        }

        state.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn delete_appointment(&self, appointment_id: Uuid) -> StoreResult<()> {
        self.state().appointments.remove(&appointment_id);
        Ok(())
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Appointment>> {
        Ok(self.state().appointments.get(&appointment_id).cloned())
    }

    async fn find_active_appointment(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<Option<Appointment>> {
        Ok(self.state().appointments.values()
            .find(|a| {
                a.professional_id == professional_id
                    && a.date == date
                    && a.time == time
                    && a.status.occupies_slot()
            })
            .cloned())
    }

    async fn booked_times(&self, professional_id: Uuid, date: NaiveDate) -> StoreResult<Vec<NaiveTime>> {
        let mut times: Vec<NaiveTime> = self.state().appointments.values()
            .filter(|a| a.professional_id == professional_id && a.date == date && a.status.occupies_slot())
            .map(|a| a.time)
            .collect();
        times.sort();
        Ok(times)
    }

    async fn list_appointments(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Appointment>> {
        Ok(self.appointments_for(professional_id)
            .into_iter()
            .filter(|a| a.date >= from && a.date <= to)
            .collect())
    }

    async fn transition_appointment(
        &self,
        appointment_id: Uuid,
        to: AppointmentStatus,
        allowed_from: &[AppointmentStatus],
    ) -> StoreResult<Option<Appointment>> {
        if self.fail_next_transition.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("appointment update unavailable".to_string()));
        }

        let mut state = self.state();
        match state.appointments.get_mut(&appointment_id) {
            Some(appointment) if allowed_from.contains(&appointment.status) => {
                appointment.status = to;
                appointment.updated_at = Utc::now();
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn get_usage_profile(&self, professional_id: Uuid) -> StoreResult<Option<UsageProfile>> {
        Ok(self.state().usage.get(&professional_id).cloned())
    }

    async fn reserve_usage(
        &self,
        professional_id: Uuid,
        today: NaiveDate,
        trial_limit: i32,
    ) -> StoreResult<Option<UsageProfile>> {
        if self.fail_usage_reservation.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("usage counter unavailable".to_string()));
        }

        let mut state = self.state();
        let usage = state.usage
            .entry(professional_id)
            .or_insert_with(|| UsageProfile::new_trial(professional_id));

        let used = usage.usage_on(today);
        if usage.plan == Plan::Trial && used >= trial_limit {
            return Ok(None);
        }

        usage.daily_usage = used + 1;
        usage.last_usage_date = Some(today);
        Ok(Some(usage.clone()))
    }

    async fn release_usage(&self, professional_id: Uuid, today: NaiveDate) -> StoreResult<()> {
        if let Some(usage) = self.state().usage.get_mut(&professional_id) {
            if usage.last_usage_date == Some(today) && usage.daily_usage > 0 {
                usage.daily_usage -= 1;
            }
        }
        Ok(())
    }

    async fn revert_premium(&self, professional_id: Uuid) -> StoreResult<()> {
        if let Some(usage) = self.state().usage.get_mut(&professional_id) {
            usage.plan = Plan::Trial;
            usage.premium_expires_at = None;
        }
        Ok(())
    }

    async fn insert_payment_intent(&self, intent: &PaymentIntent) -> StoreResult<PaymentIntent> {
        let mut state = self.state();
        let duplicate = state.intents.contains_key(&intent.id)
            || state.intents.values().any(|i| i.appointment_id == intent.appointment_id);
        if duplicate {
            return Err(StoreError::UniqueViolation(format!("payment intent {}", intent.id)));
        }
        state.intents.insert(intent.id.clone(), intent.clone());
        Ok(intent.clone())
    }

    async fn get_payment_intent(&self, payment_id: &str) -> StoreResult<Option<PaymentIntent>> {
        Ok(self.state().intents.get(payment_id).cloned())
    }

    async fn get_payment_intent_for_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<PaymentIntent>> {
        Ok(self.state().intents.values()
            .find(|i| i.appointment_id == appointment_id)
            .cloned())
    }

    async fn update_payment_status(&self, payment_id: &str, status: PaymentStatus) -> StoreResult<()> {
        if let Some(intent) = self.state().intents.get_mut(payment_id) {
            intent.status = status;
            intent.updated_at = Utc::now();
        }
        Ok(())
    }
}

// ==============================================================================
// FIXTURES
// ==============================================================================

pub fn business_profile(professional_id: Uuid, service_price: Option<f64>) -> BusinessProfile {
    BusinessProfile {
        service_price,
        ..BusinessProfile::with_defaults(professional_id)
    }
}

pub fn gateway_connection(professional_id: Uuid) -> GatewayConnection {
    GatewayConnection {
        professional_id,
        access_token: "APP_USR-test-access-token".to_string(),
        expires_at: None,
    }
}

pub fn appointment(
    professional_id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
    status: AppointmentStatus,
) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        professional_id,
        client_name: "Maria Souza".to_string(),
        client_phone: "11987654321".to_string(),
        client_email: Some("maria@example.com".to_string()),
        date,
        time,
        status,
        link_id: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn hour(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).expect("valid hour")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.database_key(), "test-service-role-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_slot_uniqueness() {
        let store = InMemoryStore::new();
        let professional_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let first = appointment(professional_id, date, hour(10), AppointmentStatus::Confirmado);
        store.insert_appointment(&first).await.unwrap();

        let second = appointment(professional_id, date, hour(10), AppointmentStatus::Confirmado);
        assert!(matches!(
            store.insert_appointment(&second).await,
            Err(StoreError::UniqueViolation(_))
        ));

        store
            .transition_appointment(first.id, AppointmentStatus::Cancelado, &[AppointmentStatus::Confirmado])
            .await
            .unwrap();
        store.insert_appointment(&second).await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_link_consumed_once() {
        let store = InMemoryStore::new();
        let link = OneTimeLink::new(Uuid::new_v4());
        store.put_link(link.clone());

        assert!(store.consume_link(link.id, Uuid::new_v4()).await.unwrap());
        assert!(!store.consume_link(link.id, Uuid::new_v4()).await.unwrap());
    }
}
