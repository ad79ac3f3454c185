// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! # Stay Booking
//!
//! This library provides a reservation engine for accommodation listings:
//! it decides whether a date range may be booked, prices the stay, drives
//! the reservation through its lifecycle and gates reviews on completed stays.
//!
//! ## Core Components
//!
//! - [`Engine`]: Central lifecycle manager and entry point for callers
//! - [`ListingRegistry`]: Listing facts (capacity, nightly price, availability)
//! - [`AvailabilityIndex`]: Per-listing calendars of active stays
//! - [`pricing::quote`]: Deterministic stay pricing
//! - [`ReviewLog`]: Review storage behind the eligibility gate
//! - [`BookingError`]: Rejection reasons, grouped by [`ErrorKind`]
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//! use stay_booking_rs::{
//!     BookingRequest, Engine, FixedClock, NewListing, ReservationStatus, UserId,
//! };
//!
//! let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
//! let engine = Engine::with_clock(clock);
//! let host = UserId(1);
//! let listing = engine
//!     .create_listing(NewListing::new(host, dec!(100), 4))
//!     .unwrap();
//!
//! let reservation = engine
//!     .request_booking(BookingRequest {
//!         listing_id: listing.id,
//!         guest_id: UserId(2),
//!         check_in: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
//!         check_out: NaiveDate::from_ymd_opt(2024, 7, 5).unwrap(),
//!         guest_count: 2,
//!     })
//!     .unwrap();
//! assert_eq!(reservation.status, ReservationStatus::Pending);
//! assert_eq!(reservation.total_price, dec!(400));
//!
//! let confirmed = engine.confirm(reservation.id, host).unwrap();
//! assert_eq!(confirmed.status, ReservationStatus::Confirmed);
//! ```
//!
//! ## Thread Safety
//!
//! The engine is `Send + Sync`. Bookings for the same listing are serialized
//! by that listing's calendar lock, status changes by the reservation's own
//! lock; everything else runs in parallel.

pub mod availability;
mod base;
mod clock;
mod config;
mod engine;
pub mod error;
mod event;
pub mod listing;
pub mod pricing;
mod reservation;
pub mod review;

pub use availability::{Availability, AvailabilityIndex};
pub use base::{ListingId, ReservationId, ReviewId, StayDates, UserId};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{BookingRequest, Engine};
pub use error::{BookingError, ConfigError, ErrorKind};
pub use event::{BookingEvent, Completion, EventQueue};
pub use listing::{Listing, ListingRegistry, ListingUpdate, MAX_NIGHTLY_PRICE, NewListing};
pub use pricing::Quote;
pub use reservation::{Reservation, ReservationStatus};
pub use review::{Eligibility, IneligibleReason, NewReview, Review, ReviewLog};
