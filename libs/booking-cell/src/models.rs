use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::time_format::parse_time_of_day;
use shared_models::Appointment;

/// Bookings a trial professional may receive per local calendar day.
pub const TRIAL_DAILY_LIMIT: i32 = 5;

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("Unknown booking link")]
    InvalidLink,

    #[error("Booking link already used")]
    UsedLink,

    #[error("Booking already completed for this link")]
    AlreadyCompleted,

    #[error("Daily booking quota exceeded")]
    QuotaExceeded,

    #[error("Slot already taken")]
    SlotTaken,

    #[error("Slot not offered: {0}")]
    SlotUnavailable(String),

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        BookingError::DatabaseError(err.to_string())
    }
}

// ==============================================================================
// REQUESTS
// ==============================================================================

/// Public booking form submitted through a one-time link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub token_id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub date: String,
    pub time: String,
}

/// Booking entered by the professional from the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardBookingRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

/// Client details and slot after local validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientDetails {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl ClientDetails {
    pub fn parse(
        name: &str,
        phone: &str,
        email: Option<&str>,
        date: &str,
        time: &str,
    ) -> Result<Self, BookingError> {
        let name = name.trim();
        let name_len = name.chars().count();
        if !(2..=120).contains(&name_len) {
            return Err(BookingError::ValidationError(
                "Nome deve ter entre 2 e 120 caracteres".to_string(),
            ));
        }

        let phone = normalize_phone(phone)?;

        let email = match email.map(str::trim).filter(|e| !e.is_empty()) {
            Some(e) if is_plausible_email(e) => Some(e.to_string()),
            Some(_) => return Err(BookingError::ValidationError("E-mail inválido".to_string())),
            None => None,
        };

        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| BookingError::ValidationError("Data inválida, use AAAA-MM-DD".to_string()))?;

        let time = parse_time_of_day(time)
            .filter(|t| t.minute() == 0 && t.second() == 0)
            .ok_or_else(|| BookingError::ValidationError("Horário inválido".to_string()))?;

        Ok(Self { name: name.to_string(), phone, email, date, time })
    }
}

impl BookingRequest {
    pub fn details(&self) -> Result<ClientDetails, BookingError> {
        ClientDetails::parse(&self.name, &self.phone, self.email.as_deref(), &self.date, &self.time)
    }
}

impl DashboardBookingRequest {
    pub fn details(&self) -> Result<ClientDetails, BookingError> {
        ClientDetails::parse(&self.name, &self.phone, self.email.as_deref(), &self.date, &self.time)
    }
}

fn normalize_phone(raw: &str) -> Result<String, BookingError> {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '-' | ' ' | '+'))
        .collect();

    let valid = (10..=13).contains(&stripped.len()) && stripped.chars().all(|c| c.is_ascii_digit());
    if !valid {
        return Err(BookingError::ValidationError("Telefone inválido".to_string()));
    }
    Ok(stripped)
}

fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => !local.is_empty() && !domain.is_empty(),
        _ => false,
    }
}

// ==============================================================================
// RESPONSES
// ==============================================================================

/// Outcome of resolving a one-time link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkState {
    /// Unused; the holder may book.
    Valid { professional_id: Uuid },
    /// Used by an appointment still awaiting payment. The holder may resume
    /// the payment but not book again.
    Recoverable {
        professional_id: Uuid,
        appointment: Appointment,
        payment_id: Option<String>,
    },
}

/// Body of `GET /public/links/{token}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkView {
    Valid {
        professional_id: Uuid,
        service_price: f64,
    },
    PaymentPending {
        appointment: Appointment,
        payment_id: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub requires_payment: bool,
    pub amount: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(name: &str, phone: &str, email: Option<&str>, date: &str, time: &str) -> Result<ClientDetails, BookingError> {
        ClientDetails::parse(name, phone, email, date, time)
    }

    #[test]
    fn test_valid_details_are_normalized() {
        let details = parse("  Ana Lima ", "(11) 98765-4321", Some(" ana@example.com "), "2026-10-20", "14:00:00").unwrap();

        assert_eq!(details.name, "Ana Lima");
        assert_eq!(details.phone, "11987654321");
        assert_eq!(details.email.as_deref(), Some("ana@example.com"));
        assert_eq!(details.time, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
    }

    #[test]
    fn test_international_phone_accepted() {
        assert!(parse("Ana", "+55 11 98765-4321", None, "2026-10-20", "09:00").is_ok());
    }

    #[test]
    fn test_rejections() {
        assert_matches!(parse("A", "11987654321", None, "2026-10-20", "09:00"), Err(BookingError::ValidationError(_)));
        assert_matches!(parse("Ana", "12345", None, "2026-10-20", "09:00"), Err(BookingError::ValidationError(_)));
        assert_matches!(parse("Ana", "11 9876x4321", None, "2026-10-20", "09:00"), Err(BookingError::ValidationError(_)));
        assert_matches!(parse("Ana", "11987654321", Some("a@b@c"), "2026-10-20", "09:00"), Err(BookingError::ValidationError(_)));
        assert_matches!(parse("Ana", "11987654321", Some("@example.com"), "2026-10-20", "09:00"), Err(BookingError::ValidationError(_)));
        assert_matches!(parse("Ana", "11987654321", None, "20/10/2026", "09:00"), Err(BookingError::ValidationError(_)));
        assert_matches!(parse("Ana", "11987654321", None, "2026-10-20", "09:30"), Err(BookingError::ValidationError(_)));
    }

    #[test]
    fn test_blank_email_is_absent() {
        let details = parse("Ana", "11987654321", Some("  "), "2026-10-20", "09:00").unwrap();
        assert!(details.email.is_none());
    }

    #[test]
    fn test_booking_request_wire_format() {
        let request: BookingRequest = serde_json::from_value(serde_json::json!({
            "tokenId": Uuid::new_v4(),
            "name": "Ana",
            "phone": "11987654321",
            "email": null,
            "date": "2026-10-20",
            "time": "10:00"
        }))
        .unwrap();
        assert!(request.details().is_ok());
    }
}
