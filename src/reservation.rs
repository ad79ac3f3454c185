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

//! Reservation records and their status state machine.
//!
//! ```text
//!  Pending ──confirm──► Confirmed ──checkout passed / operator──► Completed
//!     │                     │
//!     └───────cancel────────┴──────────────────────────────────► Cancelled
//! ```
//!
//! Instant-book listings create reservations directly in `Confirmed`.
//! `Cancelled` and `Completed` are terminal.

use crate::base::{ListingId, ReservationId, StayDates, UserId};
use crate::error::BookingError;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    /// Pending and confirmed reservations hold their dates.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    pub const fn can_transition_to(self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled)
                | (Self::Confirmed, Self::Completed)
        )
    }

    /// Status as seen at `today`, applying the checkout-driven completion.
    ///
    /// Pure: stored state is not touched.
    pub fn effective(self, check_out: NaiveDate, today: NaiveDate) -> ReservationStatus {
        if self == Self::Confirmed && checkout_passed(check_out, today) {
            Self::Completed
        } else {
            self
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// A stay is over once the calendar has moved past its checkout date.
pub fn checkout_passed(check_out: NaiveDate, today: NaiveDate) -> bool {
    check_out < today
}

/// Snapshot of a reservation.
///
/// `total_price` and `host_id` are captured at creation and never
/// recomputed from the listing afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub listing_id: ListingId,
    pub guest_id: UserId,
    pub host_id: UserId,
    pub dates: StayDates,
    pub guest_count: u32,
    pub total_price: Decimal,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn nights(&self) -> u32 {
        self.dates.nights()
    }

    /// True if `actor` is the guest or the listing host.
    pub fn is_party(&self, actor: UserId) -> bool {
        actor == self.guest_id || actor == self.host_id
    }
}

/// Stored reservation guarded by its own lock.
///
/// Status changes go through [`ReservationRecord::transition`], a
/// compare-and-swap on the current status, so concurrent `cancel` /
/// `confirm` / `complete` calls on the same reservation cannot both win.
#[derive(Debug)]
pub struct ReservationRecord {
    inner: Mutex<Reservation>,
}

impl ReservationRecord {
    pub fn new(reservation: Reservation) -> Self {
        Self {
            inner: Mutex::new(reservation),
        }
    }

    pub fn snapshot(&self) -> Reservation {
        self.inner.lock().clone()
    }

    /// Moves the reservation to `next`.
    ///
    /// `guard` runs under the lock against the current snapshot and may veto
    /// the change (authorization, date rules). Returns the updated snapshot.
    ///
    /// # Errors
    ///
    /// - Whatever `guard` returns.
    /// - [`BookingError::AlreadyTerminal`] if the current status is terminal.
    /// - [`BookingError::InvalidTransition`] for any other illegal move.
    pub fn transition<F>(&self, next: ReservationStatus, guard: F) -> Result<Reservation, BookingError>
    where
        F: FnOnce(&Reservation) -> Result<(), BookingError>,
    {
        let mut data = self.inner.lock();
        guard(&data)?;
        if data.status.is_terminal() {
            return Err(BookingError::AlreadyTerminal(data.status));
        }
        if !data.status.can_transition_to(next) {
            return Err(BookingError::InvalidTransition {
                from: data.status,
                to: next,
            });
        }
        data.status = next;
        Ok(data.clone())
    }

    /// Completes a confirmed reservation whose checkout has passed.
    ///
    /// Returns the updated snapshot only when this call made the change,
    /// so repeated calls are no-ops.
    pub fn settle(&self, today: NaiveDate) -> Option<Reservation> {
        let mut data = self.inner.lock();
        let effective = data.status.effective(data.dates.check_out(), today);
        if effective == data.status {
            return None;
        }
        data.status = effective;
        Some(data.clone())
    }
}
