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

//! Error types for booking, lifecycle and review operations.
//!
//! Every rejection carries enough context for a transport layer to build a
//! response; [`BookingError::kind`] groups them into the coarse categories
//! callers usually map onto protocol status codes.

use crate::base::ReservationId;
use crate::reservation::ReservationStatus;
use crate::review::IneligibleReason;
use thiserror::Error;

/// Coarse classification of a [`BookingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input: dates, guest counts, prices, ratings.
    Validation,
    /// Date overlap with an active reservation.
    Conflict,
    /// Unknown listing or reservation.
    NotFound,
    /// Actor lacks permission for the operation.
    Forbidden,
    /// Operation is illegal in the current status.
    State,
}

impl ErrorKind {
    /// Conventional HTTP status for this kind.
    pub const fn http_status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::NotFound => 404,
            ErrorKind::Forbidden => 403,
            ErrorKind::State => 409,
        }
    }
}

/// Booking processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Referenced listing does not exist
    #[error("listing not found")]
    ListingNotFound,

    /// Referenced reservation does not exist
    #[error("reservation not found")]
    ReservationNotFound,

    /// Listing exists but its host disabled availability
    #[error("listing is not open for booking")]
    ListingNotBookable,

    /// Check-out is not strictly after check-in
    #[error("check-out must be after check-in")]
    InvalidDateRange,

    /// Check-in lies before today
    #[error("check-in date cannot be in the past")]
    CheckInInPast,

    /// Guest count is zero
    #[error("guest count must be at least 1")]
    InvalidGuestCount,

    /// Guest count above the listing capacity
    #[error("guest count {requested} exceeds listing capacity {max}")]
    GuestCountExceeded { requested: u32, max: u32 },

    /// Nightly price not positive, above the maximum or finer than cents
    #[error("nightly price must be between 0.01 and 99999999.99")]
    InvalidPrice,

    /// Nightly price times nights does not fit in a decimal
    #[error("stay total exceeds the supported amount")]
    TotalOverflow,

    /// Listing capacity outside the configured bounds
    #[error("listing capacity must be between 1 and {max}")]
    InvalidCapacity { max: u32 },

    /// Review rating outside 1..=5
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    /// Requested dates overlap an active reservation
    #[error("dates conflict with reservation {0}")]
    DateConflict(ReservationId),

    /// Actor is neither the guest nor the host allowed to act
    #[error("actor is not allowed to perform this operation")]
    Forbidden,

    /// Reservation is already cancelled or completed
    #[error("reservation is already {0}")]
    AlreadyTerminal(ReservationStatus),

    /// Transition not allowed from the current status
    #[error("cannot move reservation from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    /// Completion requested before the checkout date passed
    #[error("checkout date has not passed yet")]
    CheckoutNotReached,

    /// Cancellation requested inside the configured cutoff window
    #[error("cancellation window has closed")]
    CancellationWindowClosed,

    /// Listing still referenced by pending or confirmed reservations
    #[error("listing has active reservations")]
    ListingInUse,

    /// Review gate refused the submission
    #[error("not eligible to review: {0}")]
    NotEligible(IneligibleReason),
}

impl BookingError {
    /// Category of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            BookingError::InvalidDateRange
            | BookingError::CheckInInPast
            | BookingError::InvalidGuestCount
            | BookingError::GuestCountExceeded { .. }
            | BookingError::InvalidPrice
            | BookingError::TotalOverflow
            | BookingError::InvalidCapacity { .. }
            | BookingError::InvalidRating(_) => ErrorKind::Validation,
            BookingError::DateConflict(_) => ErrorKind::Conflict,
            BookingError::ListingNotFound | BookingError::ReservationNotFound => {
                ErrorKind::NotFound
            }
            BookingError::Forbidden => ErrorKind::Forbidden,
            BookingError::ListingNotBookable
            | BookingError::AlreadyTerminal(_)
            | BookingError::InvalidTransition { .. }
            | BookingError::CheckoutNotReached
            | BookingError::CancellationWindowClosed
            | BookingError::ListingInUse
            | BookingError::NotEligible(_) => ErrorKind::State,
        }
    }

    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            BookingError::ListingNotFound => "LISTING_NOT_FOUND",
            BookingError::ReservationNotFound => "RESERVATION_NOT_FOUND",
            BookingError::ListingNotBookable => "LISTING_NOT_BOOKABLE",
            BookingError::InvalidDateRange => "INVALID_DATE_RANGE",
            BookingError::CheckInInPast => "CHECK_IN_IN_PAST",
            BookingError::InvalidGuestCount => "INVALID_GUEST_COUNT",
            BookingError::GuestCountExceeded { .. } => "GUEST_COUNT_EXCEEDED",
            BookingError::InvalidPrice => "INVALID_PRICE",
            BookingError::TotalOverflow => "TOTAL_OVERFLOW",
            BookingError::InvalidCapacity { .. } => "INVALID_CAPACITY",
            BookingError::InvalidRating(_) => "INVALID_RATING",
            BookingError::DateConflict(_) => "DATE_CONFLICT",
            BookingError::Forbidden => "FORBIDDEN",
            BookingError::AlreadyTerminal(_) => "ALREADY_TERMINAL",
            BookingError::InvalidTransition { .. } => "INVALID_TRANSITION",
            BookingError::CheckoutNotReached => "CHECKOUT_NOT_REACHED",
            BookingError::CancellationWindowClosed => "CANCELLATION_WINDOW_CLOSED",
            BookingError::ListingInUse => "LISTING_IN_USE",
            BookingError::NotEligible(_) => "NOT_ELIGIBLE",
        }
    }
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
