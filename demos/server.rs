//! REST API server example for the booking engine.
//!
//! Run with: `cargo run --example server`
//!
//! The caller's identity comes from the `x-user-id` header; authenticating it
//! is the job of whatever sits in front of this server. Booking events are
//! drained once a second and written to the log.
//!
//! ## Endpoints
//!
//! - `POST   /listings` - Create a listing (owner = caller)
//! - `GET    /listings` - List all listings
//! - `GET    /listings/{id}` - Get a listing
//! - `PATCH  /listings/{id}` - Owner update
//! - `DELETE /listings/{id}` - Owner removal (refused while booked)
//! - `GET    /listings/{id}/availability?check_in=..&check_out=..`
//! - `GET    /listings/{id}/quote?check_in=..&check_out=..&guests=..`
//! - `GET    /listings/{id}/reviews`
//! - `POST   /reservations` - Request a booking (guest = caller)
//! - `GET    /reservations/{id}`
//! - `POST   /reservations/{id}/confirm` | `/cancel` | `/complete`
//!   (`{"operator_override": true}` ends a stay early; host or configured operator only)
//! - `GET    /reservations/{id}/eligibility`
//! - `POST   /reservations/{id}/review`
//!
//! ## Example Usage
//!
//! ```bash
//! # Host 1 creates a listing
//! curl -X POST http://localhost:3000/listings -H "x-user-id: 1" \
//!   -H "Content-Type: application/json" \
//!   -d '{"nightly_price": "100.00", "max_guests": 4, "title": "Loft"}'
//!
//! # Guest 2 books it
//! curl -X POST http://localhost:3000/reservations -H "x-user-id: 2" \
//!   -H "Content-Type: application/json" \
//!   -d '{"listing_id": 1, "check_in": "2030-07-01", "check_out": "2030-07-05", "guest_count": 2}'
//!
//! # Host confirms
//! curl -X POST http://localhost:3000/reservations/1/confirm -H "x-user-id: 1"
//! ```

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stay_booking_rs::{
    Availability, BookingError, BookingRequest, Completion, Eligibility, Engine, EngineConfig,
    Listing, ListingId, ListingUpdate, NewListing, NewReview, Quote, Reservation, ReservationId,
    Review, SystemClock, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

// === Request/Response DTOs ===

/// Listing creation body; the owner is the caller.
#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    pub nightly_price: Decimal,
    pub max_guests: u32,
    #[serde(default)]
    pub instant_book: bool,
}

/// Booking body; the guest is the caller.
#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub listing_id: u32,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_count: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    /// End the stay before checkout has passed (host or operator only).
    #[serde(default)]
    pub operator_override: bool,
}

#[derive(Debug, Deserialize)]
pub struct StayQuery {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default = "one_guest")]
    pub guests: u32,
}

fn one_guest() -> u32 {
    1
}

#[derive(Debug, Serialize)]
#[serde(tag = "availability", rename_all = "snake_case")]
pub enum AvailabilityResponse {
    Available,
    Conflict { reservation_id: ReservationId },
}

impl From<Availability> for AvailabilityResponse {
    fn from(availability: Availability) -> Self {
        match availability {
            Availability::Available => Self::Available,
            Availability::Conflict(reservation_id) => Self::Conflict { reservation_id },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewsResponse {
    pub average_rating: Option<Decimal>,
    pub reviews: Vec<Review>,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the booking engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

// === Identity ===

/// Caller identity taken from the `x-user-id` header.
pub struct Actor(pub UserId);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u32>().ok())
            .map(|id| Actor(UserId(id)))
            .ok_or(AppError::Unauthenticated)
    }
}

// === Error Handling ===

/// Converts engine rejections into HTTP responses.
pub enum AppError {
    Booking(BookingError),
    Unauthenticated,
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        AppError::Booking(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, code) = match &self {
            AppError::Booking(err) => (
                StatusCode::from_u16(err.kind().http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                err.to_string(),
                err.code(),
            ),
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "missing or invalid x-user-id header".to_string(),
                "UNAUTHENTICATED",
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Listing Handlers ===

/// POST /listings - Create a listing owned by the caller.
async fn create_listing(
    State(state): State<AppState>,
    Actor(owner): Actor,
    Json(request): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<Listing>), AppError> {
    let new = NewListing::new(owner, request.nightly_price, request.max_guests)
        .titled(request.title, request.location)
        .instant_book(request.instant_book);
    let listing = state.engine.create_listing(new)?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// GET /listings - List all listings.
async fn list_listings(State(state): State<AppState>) -> Json<Vec<Listing>> {
    Json(state.engine.listings())
}

/// GET /listings/{id} - Get a listing.
async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Listing>, AppError> {
    Ok(Json(state.engine.get_listing(ListingId(id))?))
}

/// PATCH /listings/{id} - Owner update.
async fn update_listing(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<u32>,
    Json(update): Json<ListingUpdate>,
) -> Result<Json<Listing>, AppError> {
    Ok(Json(state.engine.update_listing(ListingId(id), actor, update)?))
}

/// DELETE /listings/{id} - Owner removal.
async fn remove_listing(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<u32>,
) -> Result<StatusCode, AppError> {
    state.engine.remove_listing(ListingId(id), actor)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /listings/{id}/availability - Advisory availability check.
async fn check_availability(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Query(query): Query<StayQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let availability = state
        .engine
        .check_available(ListingId(id), query.check_in, query.check_out)?;
    Ok(Json(availability.into()))
}

/// GET /listings/{id}/quote - Price a stay.
async fn quote(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Query(query): Query<StayQuery>,
) -> Result<Json<Quote>, AppError> {
    let quote = state
        .engine
        .quote(ListingId(id), query.check_in, query.check_out, query.guests)?;
    Ok(Json(quote))
}

/// GET /listings/{id}/reviews - Reviews and average rating.
async fn listing_reviews(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<ReviewsResponse>, AppError> {
    let listing_id = ListingId(id);
    state.engine.get_listing(listing_id)?;
    Ok(Json(ReviewsResponse {
        average_rating: state.engine.average_rating(listing_id),
        reviews: state.engine.reviews_for_listing(listing_id),
    }))
}

// === Reservation Handlers ===

/// POST /reservations - Request a booking as the caller.
async fn create_reservation(
    State(state): State<AppState>,
    Actor(guest_id): Actor,
    Json(request): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    let reservation = state.engine.request_booking(BookingRequest {
        listing_id: ListingId(request.listing_id),
        guest_id,
        check_in: request.check_in,
        check_out: request.check_out,
        guest_count: request.guest_count,
    })?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /reservations/{id} - Get a reservation.
async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.engine.get_reservation(ReservationId(id))?))
}

/// POST /reservations/{id}/confirm - Host confirmation.
async fn confirm_reservation(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<u64>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.engine.confirm(ReservationId(id), actor)?))
}

/// POST /reservations/{id}/cancel - Guest or host cancellation.
async fn cancel_reservation(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<u64>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.engine.cancel(ReservationId(id), actor)?))
}

/// POST /reservations/{id}/complete - End a confirmed stay as the caller.
async fn complete_reservation(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<u64>,
    request: Option<Json<CompleteRequest>>,
) -> Result<Json<Reservation>, AppError> {
    let Json(request) = request.unwrap_or_default();
    let completion = if request.operator_override {
        Completion::OperatorOverride
    } else {
        Completion::Checkout
    };
    Ok(Json(
        state
            .engine
            .mark_completed(ReservationId(id), actor, completion)?,
    ))
}

/// GET /reservations/{id}/eligibility - Can the caller review it?
async fn review_eligibility(
    State(state): State<AppState>,
    Actor(guest_id): Actor,
    Path(id): Path<u64>,
) -> Result<Json<Eligibility>, AppError> {
    Ok(Json(state.engine.can_review(guest_id, ReservationId(id))?))
}

/// POST /reservations/{id}/review - Submit a review as the caller.
async fn submit_review(
    State(state): State<AppState>,
    Actor(guest_id): Actor,
    Path(id): Path<u64>,
    Json(review): Json<NewReview>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let review = state
        .engine
        .submit_review(guest_id, ReservationId(id), review)?;
    Ok((StatusCode::CREATED, Json(review)))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/listings", post(create_listing).get(list_listings))
        .route(
            "/listings/{id}",
            get(get_listing).patch(update_listing).delete(remove_listing),
        )
        .route("/listings/{id}/availability", get(check_availability))
        .route("/listings/{id}/quote", get(quote))
        .route("/listings/{id}/reviews", get(listing_reviews))
        .route("/reservations", post(create_reservation))
        .route("/reservations/{id}", get(get_reservation))
        .route("/reservations/{id}/confirm", post(confirm_reservation))
        .route("/reservations/{id}/cancel", post(cancel_reservation))
        .route("/reservations/{id}/complete", post(complete_reservation))
        .route("/reservations/{id}/eligibility", get(review_eligibility))
        .route("/reservations/{id}/review", post(submit_review))
        .with_state(state)
}

// === Event Delivery ===

/// Drains the engine's event queue once per `period` and logs each event.
async fn deliver_events(engine: Arc<Engine>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        for event in engine.drain_events() {
            info!(?event, "booking event");
        }
    }
}

// === Main ===

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::var("BOOKING_CONFIG") {
        Ok(path) => EngineConfig::load(path)?,
        Err(_) => EngineConfig::default(),
    };
    let addr = std::env::var("BOOKING_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

    let state = AppState {
        engine: Arc::new(Engine::with_config(config, Arc::new(SystemClock))),
    };

    tokio::spawn(deliver_events(state.engine.clone(), Duration::from_secs(1)));
    let app = create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Booking API server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
