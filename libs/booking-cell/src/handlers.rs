use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::error;
use uuid::Uuid;

use schedule_cell::DaySlots;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::{Appointment, OneTimeLink};
use shared_utils::extractor::professional_id;

use crate::models::{
    BookingError, BookingOutcome, BookingRequest, DashboardBookingRequest, DateQuery,
    DateRangeQuery, LinkState, LinkView,
};
use crate::services::parse_token;
use crate::state::BookingState;

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::InvalidLink => AppError::NotFound("Link de agendamento inválido".to_string()),
            BookingError::UsedLink => AppError::Gone("Este link de agendamento já foi utilizado".to_string()),
            BookingError::AlreadyCompleted => {
                AppError::Conflict("Agendamento já concluído para este link".to_string())
            }
            BookingError::QuotaExceeded => {
                AppError::TooManyRequests("Limite diário de agendamentos atingido".to_string())
            }
            BookingError::SlotTaken => {
                AppError::Conflict("Horário indisponível, escolha outro horário".to_string())
            }
            BookingError::SlotUnavailable(msg) => AppError::BadRequest(msg),
            BookingError::AppointmentNotFound => AppError::NotFound("Agendamento não encontrado".to_string()),
            BookingError::InvalidTransition(msg) => {
                AppError::Conflict(format!("Não é possível alterar o status: {}", msg))
            }
            BookingError::ValidationError(msg) => AppError::ValidationError(msg),
            BookingError::DatabaseError(msg) => {
                error!("Booking storage failure: {}", msg);
                AppError::Database("Erro ao acessar os dados do agendamento".to_string())
            }
        }
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

pub async fn inspect_link(
    State(state): State<Arc<BookingState>>,
    Path(token): Path<String>,
) -> Result<Json<LinkView>, AppError> {
    let token = parse_token(&token)?;

    let view = match state.bookings.links().inspect(token).await? {
        LinkState::Valid { professional_id } => {
            let profile = state
                .bookings
                .availability()
                .profile_for(professional_id)
                .await
                .map_err(BookingError::from)?;
            LinkView::Valid { professional_id, service_price: profile.price() }
        }
        LinkState::Recoverable { appointment, payment_id, .. } => {
            LinkView::PaymentPending { appointment, payment_id }
        }
    };

    Ok(Json(view))
}

pub async fn public_slots(
    State(state): State<Arc<BookingState>>,
    Path(token): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<DaySlots>, AppError> {
    let token = parse_token(&token)?;
    let professional_id = state.bookings.links().require_bookable(token).await?;

    let slots = state
        .bookings
        .availability()
        .slots_for(professional_id, query.date)
        .await
        .map_err(BookingError::from)?;

    Ok(Json(slots))
}

pub async fn public_book(
    State(state): State<Arc<BookingState>>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingOutcome>), AppError> {
    let outcome = state.bookings.book(request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// ==============================================================================
// PROFESSIONAL HANDLERS
// ==============================================================================

pub async fn issue_link(
    State(state): State<Arc<BookingState>>,
    Extension(user): Extension<User>,
) -> Result<(StatusCode, Json<OneTimeLink>), AppError> {
    let professional_id = professional_id(&user)?;
    let link = state.bookings.links().issue(professional_id).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn list_appointments(
    State(state): State<Arc<BookingState>>,
    Extension(user): Extension<User>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let professional_id = professional_id(&user)?;
    let appointments = state.bookings.list(professional_id, query.from, query.to).await?;
    Ok(Json(appointments))
}

pub async fn own_slots(
    State(state): State<Arc<BookingState>>,
    Extension(user): Extension<User>,
    Query(query): Query<DateQuery>,
) -> Result<Json<DaySlots>, AppError> {
    let professional_id = professional_id(&user)?;
    let slots = state
        .bookings
        .availability()
        .slots_for(professional_id, query.date)
        .await
        .map_err(BookingError::from)?;
    Ok(Json(slots))
}

pub async fn create_appointment(
    State(state): State<Arc<BookingState>>,
    Extension(user): Extension<User>,
    Json(request): Json<DashboardBookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let professional_id = professional_id(&user)?;
    let appointment = state.bookings.book_from_dashboard(professional_id, request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn cancel_appointment(
    State(state): State<Arc<BookingState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let professional_id = professional_id(&user)?;
    let appointment = state.bookings.cancel(professional_id, appointment_id).await?;
    Ok(Json(appointment))
}

pub async fn confirm_appointment(
    State(state): State<Arc<BookingState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let professional_id = professional_id(&user)?;
    let appointment = state.bookings.confirm(professional_id, appointment_id).await?;
    Ok(Json(appointment))
}
