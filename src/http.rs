use crate::backend::ReservationBackend;
use crate::configuration::Configuration;
use crate::error::BookingError;
use crate::identity::IdentityProvider;
use crate::slot_grid::{reservation_range, Selection, WeekGrid};
use crate::slots::{parse_slot_label, SlotSequence};
use crate::types::{Menu, NewReservation, Reservation, ReservationUpdate, Session, UnavailableSlot, User};
use crate::week::{booking_horizon, Clock, WeekWindow};
use crate::week_view::{fetch_week, fetch_week_partial, WeekData};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

lazy_static! {
    static ref SLOT_LABEL: Regex =
        Regex::new(r"^([01]\d|2[0-3]):[0-5]\d(:[0-5]\d)?$").expect("slot label pattern is valid");
}

#[derive(Clone)]
pub struct AppState<T: ReservationBackend, C: Configuration> {
    pub backend: T,
    pub configuration: C,
    pub identity: Arc<dyn IdentityProvider>,
    pub clock: Arc<dyn Clock>,
    pub slots: Arc<SlotSequence>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WeekQuery {
    anchor: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct BookingRequest {
    date: NaiveDate,
    #[validate(regex(path = *SLOT_LABEL, message = "time must look like HH:MM"))]
    time: String,
    menu: Menu,
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct CredentialsRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 6, message = "password needs at least 6 characters"))]
    password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct UpdateReservationRequest {
    id: Uuid,
    date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 100))]
    name: Option<String>,
    menu: Option<Menu>,
    #[validate(regex(path = *SLOT_LABEL))]
    start_time: Option<String>,
    #[validate(regex(path = *SLOT_LABEL))]
    end_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct AddReservationRequest {
    date: NaiveDate,
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    name: String,
    menu: Menu,
    #[validate(regex(path = *SLOT_LABEL))]
    start_time: String,
    #[validate(regex(path = *SLOT_LABEL))]
    end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CellQuery {
    date: NaiveDate,
    time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct RemoveReservationRequest {
    id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct ToggleDayRequest {
    date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct ToggleSlotRequest {
    date: NaiveDate,
    #[validate(regex(path = *SLOT_LABEL))]
    time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToggleResponse {
    unavailable: bool,
}

#[derive(Debug, Clone, Serialize)]
struct AdminWeekResponse {
    grid: WeekGrid,
    reservations: Vec<Reservation>,
}

pub fn create_app<T: ReservationBackend, C: Configuration>(
    backend: T,
    configuration: C,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
) -> Result<Router, BookingError> {
    let slots = Arc::new(configuration.slot_sequence()?);
    let state = AppState {
        backend,
        configuration,
        identity,
        clock,
        slots,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/slots", get(get_slots::<T, C>))
        .route("/week", get(get_week::<T, C>))
        .route("/reserve", post(reserve::<T, C>))
        .route("/sign_up", post(sign_up::<T, C>))
        .route("/sign_in", post(sign_in::<T, C>))
        .route("/sign_out", post(sign_out::<T, C>));

    let admin = Router::new()
        .route("/admin/week", get(get_admin_week::<T, C>))
        .route("/admin/reservation", get(get_reservation_at::<T, C>))
        .route("/admin/reservation/add", post(add_reservation::<T, C>))
        .route("/admin/reservation/update", post(update_reservation::<T, C>))
        .route("/admin/reservation/remove", post(remove_reservation::<T, C>))
        .route(
            "/admin/unavailable_day/toggle",
            post(toggle_unavailable_day::<T, C>),
        )
        .route(
            "/admin/unavailable_slot/toggle",
            post(toggle_unavailable_slot::<T, C>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth::<T, C>,
        ));

    Ok(Router::new()
        .merge(public)
        .merge(admin)
        .with_state(state)
        .layer(cors))
}

async fn admin_auth<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    request: Request,
    next: Next,
) -> Result<Response, BookingError> {
    let password = request
        .headers()
        .get(ADMIN_PASSWORD_HEADER)
        .map(|header| header.to_str().unwrap_or(""));

    match password {
        Some(password) if password == state.configuration.admin_password() => {}
        Some(_) => {
            warn!(path = %request.uri().path(), "Wrong admin password");
            return Err(BookingError::Unauthorized);
        }
        None => return Err(BookingError::Unauthorized),
    }
    Ok(next.run(request).await)
}

fn validated<P: Validate>(payload: Result<Json<P>, JsonRejection>) -> Result<P, BookingError> {
    let Json(payload) = payload.map_err(|rejection| BookingError::Validation(rejection.body_text()))?;
    payload.validate()?;
    Ok(payload)
}

fn session_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim()
        .parse()
        .ok()
}

fn current_user<T: ReservationBackend, C: Configuration>(
    state: &AppState<T, C>,
    headers: &HeaderMap,
) -> Result<User, BookingError> {
    session_token(headers)
        .and_then(|token| state.identity.current_user(token))
        .ok_or(BookingError::AuthenticationRequired)
}

fn parse_time(label: &str) -> Result<NaiveTime, BookingError> {
    parse_slot_label(label).ok_or_else(|| BookingError::InvalidSlot(label.into()))
}

/// The requested week, pulled back to the last week that may be displayed.
fn displayed_week<T: ReservationBackend, C: Configuration>(
    state: &AppState<T, C>,
    anchor: Option<NaiveDate>,
) -> (WeekWindow, NaiveDate) {
    let horizon = booking_horizon(
        state.clock.as_ref(),
        state.configuration.booking_horizon_months(),
    );
    let window = WeekWindow::containing(anchor.unwrap_or_else(|| state.clock.today()));
    if window.start() > horizon {
        return (WeekWindow::containing(horizon), horizon);
    }
    (window, horizon)
}

fn build_week<T: ReservationBackend, C: Configuration>(
    state: &AppState<T, C>,
    anchor: Option<NaiveDate>,
) -> (WeekGrid, WeekData) {
    let (window, horizon) = displayed_week(state, anchor);
    let (data, partial) = fetch_week_partial(&state.backend, window);
    let mut grid = data
        .grid(&state.slots)
        .week(window, &Selection::default(), horizon);
    grid.partial = partial;
    (grid, data)
}

async fn get_slots<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Json<Vec<String>> {
    Json(state.slots.labels())
}

async fn get_week<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Query(query): Query<WeekQuery>,
) -> Json<WeekGrid> {
    let (grid, _) = build_week(&state, query.anchor);
    Json(grid)
}

async fn reserve<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    headers: HeaderMap,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<Json<Reservation>, BookingError> {
    let booking = validated(payload)?;
    let user = current_user(&state, &headers)?;

    let start_time = parse_time(&booking.time)?;
    let (end_time, wrapped) = start_time.overflowing_add_signed(booking.menu.duration());
    if wrapped != 0 {
        return Err(BookingError::Validation(
            "Reservation must end on the same day".into(),
        ));
    }
    let range = reservation_range(&state.slots, start_time, end_time)?;
    if booking.date < state.clock.today() {
        return Err(BookingError::Validation(format!(
            "{} already passed",
            booking.date
        )));
    }

    // Best effort only: a concurrent booking between this read and the insert is not detected.
    let data = fetch_week(&state.backend, WeekWindow::containing(booking.date))?;
    data.grid(&state.slots)
        .ensure_available(booking.date, range)?;

    let reservation = state.backend.add_reservation(NewReservation {
        date: booking.date,
        start_time,
        end_time,
        name: booking.name,
        menu: booking.menu.to_string(),
        owner: Some(user.id),
    })?;
    info!(id = %reservation.id, user = %user.id, date = %reservation.date, "Reservation created");
    Ok(Json(reservation))
}

async fn sign_up<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<User>, BookingError> {
    let credentials = validated(payload)?;
    let user = state
        .identity
        .sign_up(&credentials.email, &credentials.password)?;
    Ok(Json(user))
}

async fn sign_in<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<Session>, BookingError> {
    let credentials = validated(payload)?;
    let session = state
        .identity
        .sign_in(&credentials.email, &credentials.password)?;
    Ok(Json(session))
}

async fn sign_out<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, BookingError> {
    let token = session_token(&headers).ok_or(BookingError::AuthenticationRequired)?;
    state.identity.sign_out(token)?;
    Ok((StatusCode::OK, "Signed out successfully".to_string()))
}

async fn get_admin_week<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Query(query): Query<WeekQuery>,
) -> Json<AdminWeekResponse> {
    let (grid, data) = build_week(&state, query.anchor);
    Json(AdminWeekResponse {
        grid,
        reservations: data.reservations,
    })
}

/// The reservation covering a grid cell, not only the one starting there.
async fn get_reservation_at<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Query(query): Query<CellQuery>,
) -> Result<Json<Reservation>, BookingError> {
    let data = fetch_week(&state.backend, WeekWindow::containing(query.date))?;
    let grid = data.grid(&state.slots);
    if grid.slot_index(&query.time).is_none() {
        return Err(BookingError::InvalidSlot(query.time));
    }

    grid.covering_reservation(query.date, &query.time)
        .cloned()
        .map(Json)
        .ok_or_else(|| BookingError::NotFound(format!("Reservation at {} {}", query.date, query.time)))
}

async fn add_reservation<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    payload: Result<Json<AddReservationRequest>, JsonRejection>,
) -> Result<Json<Reservation>, BookingError> {
    let request = validated(payload)?;
    let start_time = parse_time(&request.start_time)?;
    let end_time = parse_time(&request.end_time)?;
    reservation_range(&state.slots, start_time, end_time)?;

    let reservation = state.backend.add_reservation(NewReservation {
        date: request.date,
        start_time,
        end_time,
        name: request.name,
        menu: request.menu.to_string(),
        owner: None,
    })?;
    info!(id = %reservation.id, date = %reservation.date, "Reservation added by admin");
    Ok(Json(reservation))
}

async fn update_reservation<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    payload: Result<Json<UpdateReservationRequest>, JsonRejection>,
) -> Result<Json<Reservation>, BookingError> {
    let request = validated(payload)?;
    let update = ReservationUpdate {
        date: request.date,
        name: request.name,
        menu: request.menu.map(|menu| menu.to_string()),
        start_time: request.start_time.as_deref().map(parse_time).transpose()?,
        end_time: request.end_time.as_deref().map(parse_time).transpose()?,
    };

    let current = state.backend.reservation(request.id)?;
    let edited = current.updated(&update);
    reservation_range(&state.slots, edited.start_time, edited.end_time)?;

    let reservation = state.backend.update_reservation(request.id, update)?;
    info!(id = %reservation.id, "Reservation updated");
    Ok(Json(reservation))
}

async fn remove_reservation<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    payload: Result<Json<RemoveReservationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let request = validated(payload)?;
    state.backend.remove_reservation(request.id)?;
    info!(id = %request.id, "Reservation removed");
    Ok((StatusCode::OK, "Reservation removed successfully".to_string()))
}

async fn toggle_unavailable_day<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    payload: Result<Json<ToggleDayRequest>, JsonRejection>,
) -> Result<Json<ToggleResponse>, BookingError> {
    let request = validated(payload)?;
    let unavailable = state.backend.toggle_unavailable_day(request.date)?;
    info!(date = %request.date, unavailable, "Toggled day");
    Ok(Json(ToggleResponse { unavailable }))
}

async fn toggle_unavailable_slot<T: ReservationBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    payload: Result<Json<ToggleSlotRequest>, JsonRejection>,
) -> Result<Json<ToggleResponse>, BookingError> {
    let request = validated(payload)?;
    let time = state
        .slots
        .slot_index(&request.time)
        .and_then(|index| state.slots.time(index))
        .ok_or_else(|| BookingError::InvalidSlot(request.time.clone()))?;

    let unavailable = state
        .backend
        .toggle_unavailable_slot(UnavailableSlot {
            date: request.date,
            time,
        })?;
    info!(date = %request.date, time = %request.time, unavailable, "Toggled slot");
    Ok(Json(ToggleResponse { unavailable }))
}
