use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{
    Appointment, AppointmentStatus, BusinessProfile, GatewayConnection, OneTimeLink,
    PaymentIntent, PaymentStatus, UsageProfile,
};

use crate::store::{BookingStore, StoreError, StoreResult};
use crate::supabase::{return_representation, SupabaseClient};

/// `BookingStore` over Supabase PostgREST. The invariants rely on the schema
/// in `supabase/migrations`: the partial unique index on active appointment
/// slots and the `reserve_daily_usage` / `release_daily_usage` functions.
pub struct SupabaseStore {
    supabase: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub fn from_client(supabase: SupabaseClient) -> Self {
        Self { supabase }
    }

    async fn fetch_one<T>(&self, path: &str) -> StoreResult<Option<T>>
    where T: serde::de::DeserializeOwned {
        let rows: Vec<T> = self.supabase.request(Method::GET, path, None).await?;
        Ok(rows.into_iter().next())
    }
}

fn status_list(statuses: &[AppointmentStatus]) -> String {
    statuses.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(",")
}

fn time_filter(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

#[async_trait]
impl BookingStore for SupabaseStore {
    async fn get_business_profile(&self, professional_id: Uuid) -> StoreResult<Option<BusinessProfile>> {
        let path = format!("/rest/v1/business_profiles?professional_id=eq.{}&limit=1", professional_id);
        self.fetch_one(&path).await
    }

    async fn get_gateway_connection(&self, professional_id: Uuid) -> StoreResult<Option<GatewayConnection>> {
        let path = format!(
            "/rest/v1/mercadopago_connections?professional_id=eq.{}&select=professional_id,access_token,expires_at&limit=1",
            professional_id
        );
        self.fetch_one(&path).await
    }

    async fn insert_link(&self, link: &OneTimeLink) -> StoreResult<OneTimeLink> {
        let rows: Vec<OneTimeLink> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/one_time_links",
            Some(serde_json::to_value(link)?),
            Some(return_representation()),
        ).await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Failed to create link".to_string()))
    }

    async fn get_link(&self, token: Uuid) -> StoreResult<Option<OneTimeLink>> {
        let path = format!("/rest/v1/one_time_links?id=eq.{}&limit=1", token);
        self.fetch_one(&path).await
    }

    async fn consume_link(&self, token: Uuid, appointment_id: Uuid) -> StoreResult<bool> {
        let path = format!("/rest/v1/one_time_links?id=eq.{}&is_used=eq.false", token);
        let rows: Vec<OneTimeLink> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(json!({ "is_used": true, "appointment_id": appointment_id })),
            Some(return_representation()),
        ).await?;

        debug!("Consume of link {} matched {} row(s)", token, rows.len());
        Ok(!rows.is_empty())
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> StoreResult<Appointment> {
        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(serde_json::to_value(appointment)?),
            Some(return_representation()),
        ).await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Failed to create appointment".to_string()))
    }

    async fn delete_appointment(&self, appointment_id: Uuid) -> StoreResult<()> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        self.supabase.execute(Method::DELETE, &path, None).await?;
        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Appointment>> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", appointment_id);
        self.fetch_one(&path).await
    }

    async fn find_active_appointment(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<Option<Appointment>> {
        let path = format!(
            "/rest/v1/appointments?professional_id=eq.{}&date=eq.{}&time=eq.{}&status=neq.{}&limit=1",
            professional_id,
            date,
            time_filter(time),
            AppointmentStatus::Cancelado
        );
        self.fetch_one(&path).await
    }

    async fn booked_times(&self, professional_id: Uuid, date: NaiveDate) -> StoreResult<Vec<NaiveTime>> {
        let path = format!(
            "/rest/v1/appointments?professional_id=eq.{}&date=eq.{}&status=neq.{}&order=time.asc",
            professional_id,
            date,
            AppointmentStatus::Cancelado
        );
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().map(|a| a.time).collect())
    }

    async fn list_appointments(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Appointment>> {
        let path = format!(
            "/rest/v1/appointments?professional_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc,time.asc",
            professional_id, from, to
        );
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows)
    }

    async fn transition_appointment(
        &self,
        appointment_id: Uuid,
        to: AppointmentStatus,
        allowed_from: &[AppointmentStatus],
    ) -> StoreResult<Option<Appointment>> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=in.({})",
            appointment_id,
            status_list(allowed_from)
        );
        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(json!({ "status": to, "updated_at": Utc::now().to_rfc3339() })),
            Some(return_representation()),
        ).await?;

        Ok(rows.into_iter().next())
    }

    async fn get_usage_profile(&self, professional_id: Uuid) -> StoreResult<Option<UsageProfile>> {
        let path = format!("/rest/v1/usage_profiles?professional_id=eq.{}&limit=1", professional_id);
        self.fetch_one(&path).await
    }

    async fn reserve_usage(
        &self,
        professional_id: Uuid,
        today: NaiveDate,
        trial_limit: i32,
    ) -> StoreResult<Option<UsageProfile>> {
        let rows: Vec<UsageProfile> = self.supabase.rpc(
            "reserve_daily_usage",
            json!({
                "p_professional_id": professional_id,
                "p_today": today,
                "p_trial_limit": trial_limit
            }),
        ).await?;
        Ok(rows.into_iter().next())
    }

    async fn release_usage(&self, professional_id: Uuid, today: NaiveDate) -> StoreResult<()> {
        self.supabase.execute(
            Method::POST,
            "/rest/v1/rpc/release_daily_usage",
            Some(json!({ "p_professional_id": professional_id, "p_today": today })),
        ).await?;
        Ok(())
    }

    async fn revert_premium(&self, professional_id: Uuid) -> StoreResult<()> {
        let path = format!("/rest/v1/usage_profiles?professional_id=eq.{}", professional_id);
        self.supabase.execute(
            Method::PATCH,
            &path,
            Some(json!({ "plan": "trial", "premium_expires_at": null })),
        ).await?;
        Ok(())
    }

    async fn insert_payment_intent(&self, intent: &PaymentIntent) -> StoreResult<PaymentIntent> {
        let rows: Vec<PaymentIntent> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/payment_intents",
            Some(serde_json::to_value(intent)?),
            Some(return_representation()),
        ).await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Failed to create payment intent".to_string()))
    }

    async fn get_payment_intent(&self, payment_id: &str) -> StoreResult<Option<PaymentIntent>> {
        let path = format!("/rest/v1/payment_intents?id=eq.{}&limit=1", urlencoding::encode(payment_id));
        self.fetch_one(&path).await
    }

    async fn get_payment_intent_for_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<PaymentIntent>> {
        let path = format!(
            "/rest/v1/payment_intents?appointment_id=eq.{}&order=created_at.desc&limit=1",
            appointment_id
        );
        self.fetch_one(&path).await
    }

    async fn update_payment_status(&self, payment_id: &str, status: PaymentStatus) -> StoreResult<()> {
        let path = format!("/rest/v1/payment_intents?id=eq.{}", urlencoding::encode(payment_id));
        self.supabase.execute(
            Method::PATCH,
            &path,
            Some(json!({ "status": status, "updated_at": Utc::now().to_rfc3339() })),
        ).await?;
        Ok(())
    }
}
