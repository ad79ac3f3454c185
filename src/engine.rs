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

//! Reservation lifecycle engine.
//!
//! The [`Engine`] is the central component: it owns the listing registry,
//! the availability index, the reservation records and the review log, and
//! exposes every booking operation to callers.
//!
//! # Operations
//!
//! - **Request**: Validate listing, dates and guests, price the stay and
//!   occupy the dates, all under the listing's calendar lock.
//! - **Confirm**: Host accepts a pending reservation.
//! - **Cancel**: Guest or host cancels; the dates become free immediately.
//! - **Complete**: A confirmed stay ends once checkout has passed, either
//!   lazily when read, through [`Engine::complete_due`], or by operator override.
//! - **Review**: A guest reviews a completed stay, once.
//!
//! # Thread Safety
//!
//! Bookings are serialized per listing; status changes are serialized per
//! reservation. Requests for different listings never contend.

use crate::availability::{Availability, AvailabilityIndex, ListingCalendar};
use crate::base::{ListingId, ReservationId, StayDates, UserId};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::event::{BookingEvent, Completion, EventQueue};
use crate::listing::{Listing, ListingRegistry, ListingUpdate, NewListing};
use crate::pricing::{self, Quote};
use crate::reservation::{Reservation, ReservationRecord, ReservationStatus, checkout_passed};
use crate::review::{self, Eligibility, NewReview, Review, ReviewLog};
use crate::BookingError;
use chrono::{Days, NaiveDate};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// A guest's request to reserve a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BookingRequest {
    pub listing_id: ListingId,
    pub guest_id: UserId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_count: u32,
}

/// Reservation engine managing listings, bookings and reviews.
///
/// # Invariants
///
/// - For a listing, pending and confirmed reservations never overlap.
/// - A reservation's price is fixed when it is created.
/// - `Cancelled` and `Completed` are never left.
/// - At most one review exists per reservation, and only for completed stays.
pub struct Engine {
    listings: ListingRegistry,
    availability: AvailabilityIndex,
    reservations: DashMap<ReservationId, Arc<ReservationRecord>>,
    reviews: ReviewLog,
    events: EventQueue,
    next_reservation_id: AtomicU64,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine with default configuration and the system clock.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(EngineConfig::default(), clock)
    }

    pub fn with_config(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Engine {
            listings: ListingRegistry::new(),
            availability: AvailabilityIndex::new(),
            reservations: DashMap::new(),
            reviews: ReviewLog::new(),
            events: EventQueue::with_capacity(config.event_capacity),
            next_reservation_id: AtomicU64::new(1),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // === Listings ===

    /// Registers a listing for `new.owner_id`.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidPrice`] - Nightly price is not positive.
    /// - [`BookingError::InvalidCapacity`] - Capacity outside `1..=max_guests_limit`.
    pub fn create_listing(&self, new: NewListing) -> Result<Listing, BookingError> {
        let listing = self.listings.create(new, self.config.max_guests_limit)?;
        info!(listing = %listing.id, owner = %listing.owner_id, "listing created");
        Ok(listing)
    }

    /// Applies an owner update. Existing reservations keep their price.
    ///
    /// # Errors
    ///
    /// - [`BookingError::ListingNotFound`] - Unknown listing.
    /// - [`BookingError::Forbidden`] - `actor` is not the owner.
    /// - [`BookingError::InvalidPrice`] / [`BookingError::InvalidCapacity`] - Bad values.
    pub fn update_listing(
        &self,
        listing_id: ListingId,
        actor: UserId,
        update: ListingUpdate,
    ) -> Result<Listing, BookingError> {
        self.listings
            .update(listing_id, actor, update, self.config.max_guests_limit)
            .inspect_err(|e| debug!(listing = %listing_id, actor = %actor, error = %e, "listing update rejected"))
    }

    /// Deletes a listing that no active reservation references.
    ///
    /// Runs under the listing's calendar lock, so no booking can slip in
    /// between the check and the removal.
    ///
    /// # Errors
    ///
    /// - [`BookingError::ListingNotFound`] - Unknown listing.
    /// - [`BookingError::Forbidden`] - `actor` is not the owner.
    /// - [`BookingError::ListingInUse`] - Pending or confirmed reservations exist.
    pub fn remove_listing(&self, listing_id: ListingId, actor: UserId) -> Result<Listing, BookingError> {
        self.listings.get(listing_id)?;
        self.settle_listing(listing_id);

        let listing = self.availability.with_calendar(listing_id, |calendar| {
            let listing = self.listings.get(listing_id)?;
            if listing.owner_id != actor {
                return Err(BookingError::Forbidden);
            }
            if !calendar.is_empty() {
                return Err(BookingError::ListingInUse);
            }
            self.listings.remove(listing_id, actor)
        })?;
        self.availability.forget(listing_id);

        self.events.push(BookingEvent::ListingRemoved { listing_id });
        info!(listing = %listing_id, "listing removed");
        Ok(listing)
    }

    /// Retrieves a listing by ID.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::ListingNotFound`] for unknown IDs.
    pub fn get_listing(&self, listing_id: ListingId) -> Result<Listing, BookingError> {
        self.listings.get(listing_id)
    }

    /// True iff the listing exists and is open for booking.
    pub fn is_bookable(&self, listing_id: ListingId) -> bool {
        self.listings.is_bookable(listing_id)
    }

    pub fn listings(&self) -> Vec<Listing> {
        self.listings.listings()
    }

    // === Availability & pricing ===

    /// Reports whether `[check_in, check_out)` is free on the listing.
    ///
    /// The answer is advisory; only [`Engine::request_booking`] reserves.
    /// Stays that have completed by today do not count.
    ///
    /// # Errors
    ///
    /// - [`BookingError::ListingNotFound`] - Unknown listing.
    /// - [`BookingError::InvalidDateRange`] - `check_out <= check_in`.
    pub fn check_available(
        &self,
        listing_id: ListingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Availability, BookingError> {
        self.listings.get(listing_id)?;
        let dates = StayDates::new(check_in, check_out)?;
        let today = self.today();
        let conflict = self
            .availability
            .inspect(listing_id, |calendar| self.live_conflict(calendar, &dates, today))
            .flatten();
        Ok(conflict.map_or(Availability::Available, Availability::Conflict))
    }

    /// Prices a stay at the listing's current nightly rate.
    ///
    /// # Errors
    ///
    /// - [`BookingError::ListingNotFound`] - Unknown listing.
    /// - [`BookingError::InvalidDateRange`] - `check_out <= check_in`.
    /// - [`BookingError::InvalidGuestCount`] / [`BookingError::GuestCountExceeded`] - Bad guest count.
    /// - [`BookingError::TotalOverflow`] - Total does not fit in a decimal.
    pub fn quote(
        &self,
        listing_id: ListingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guest_count: u32,
    ) -> Result<Quote, BookingError> {
        let listing = self.listings.get(listing_id)?;
        pricing::quote(&listing, check_in, check_out, guest_count)
    }

    // === Lifecycle ===

    /// Reserves a listing for the requested stay.
    ///
    /// Instant-book listings produce a `Confirmed` reservation, others a
    /// `Pending` one awaiting the host.
    ///
    /// # Errors
    ///
    /// | Error | Cause |
    /// |-------|-------|
    /// | `ListingNotFound` | Unknown listing |
    /// | `ListingNotBookable` | Host disabled availability |
    /// | `InvalidDateRange` | `check_out <= check_in` |
    /// | `CheckInInPast` | Check-in before today (when configured) |
    /// | `InvalidGuestCount` / `GuestCountExceeded` | Guest count out of range |
    /// | `TotalOverflow` | Total does not fit in a decimal |
    /// | `DateConflict` | Dates overlap an active reservation |
    pub fn request_booking(&self, request: BookingRequest) -> Result<Reservation, BookingError> {
        self.book(&request).inspect_err(|e| {
            debug!(
                listing = %request.listing_id,
                guest = %request.guest_id,
                check_in = %request.check_in,
                check_out = %request.check_out,
                error = %e,
                "booking rejected"
            )
        })
    }

    fn book(&self, request: &BookingRequest) -> Result<Reservation, BookingError> {
        // Unknown listings never get a calendar.
        self.listings.get(request.listing_id)?;
        self.reserve(request, self.today())
    }

    /// Check-then-insert under the listing's calendar lock.
    fn reserve(&self, request: &BookingRequest, today: NaiveDate) -> Result<Reservation, BookingError> {
        let result = self.availability.with_calendar(request.listing_id, |calendar| {
            // Re-read under the lock: the listing may have been removed or
            // disabled since it was last looked up.
            let listing = self.listings.get(request.listing_id)?;
            if !listing.available {
                return Err(BookingError::ListingNotBookable);
            }
            let dates = StayDates::new(request.check_in, request.check_out)?;
            if self.config.reject_past_check_in && dates.check_in() < today {
                return Err(BookingError::CheckInInPast);
            }
            let quote = pricing::quote_stay(&listing, &dates, request.guest_count)?;
            if let Some(existing) = self.live_conflict(calendar, &dates, today) {
                return Err(BookingError::DateConflict(existing));
            }

            let status = if listing.instant_book {
                ReservationStatus::Confirmed
            } else {
                ReservationStatus::Pending
            };
            let reservation = Reservation {
                id: ReservationId(self.next_reservation_id.fetch_add(1, Ordering::Relaxed)),
                listing_id: listing.id,
                guest_id: request.guest_id,
                host_id: listing.owner_id,
                dates,
                guest_count: request.guest_count,
                total_price: quote.total,
                status,
            };

            calendar.insert(reservation.id, &dates)?;
            self.reservations.insert(
                reservation.id,
                Arc::new(ReservationRecord::new(reservation.clone())),
            );
            self.events.push(BookingEvent::ReservationCreated {
                reservation_id: reservation.id,
                listing_id: reservation.listing_id,
                guest_id: reservation.guest_id,
                status,
            });
            info!(
                reservation = %reservation.id,
                listing = %reservation.listing_id,
                guest = %reservation.guest_id,
                dates = %dates,
                total = %reservation.total_price,
                status = %status,
                "reservation created"
            );
            Ok(reservation)
        });
        if matches!(result, Err(BookingError::ListingNotFound)) {
            // Removed while we waited for the lock.
            self.availability.forget(request.listing_id);
        }
        result
    }

    /// Host accepts a pending reservation.
    ///
    /// # Errors
    ///
    /// - [`BookingError::ReservationNotFound`] - Unknown reservation.
    /// - [`BookingError::Forbidden`] - `actor` is not the listing owner.
    /// - [`BookingError::AlreadyTerminal`] - Reservation is cancelled or completed.
    /// - [`BookingError::InvalidTransition`] - Reservation is already confirmed.
    pub fn confirm(&self, reservation_id: ReservationId, actor: UserId) -> Result<Reservation, BookingError> {
        let record = self.record(reservation_id)?;
        self.settle(&record);

        let reservation = record
            .transition(ReservationStatus::Confirmed, |current| {
                if actor != current.host_id {
                    return Err(BookingError::Forbidden);
                }
                Ok(())
            })
            .inspect_err(|e| debug!(reservation = %reservation_id, actor = %actor, error = %e, "confirm rejected"))?;

        self.events.push(BookingEvent::ReservationConfirmed {
            reservation_id,
            by: actor,
        });
        info!(reservation = %reservation_id, by = %actor, "reservation confirmed");
        Ok(reservation)
    }

    /// Guest or host cancels; the dates are released at once.
    ///
    /// # Errors
    ///
    /// - [`BookingError::ReservationNotFound`] - Unknown reservation.
    /// - [`BookingError::Forbidden`] - `actor` is neither guest nor host.
    /// - [`BookingError::AlreadyTerminal`] - Reservation is cancelled or completed.
    /// - [`BookingError::CancellationWindowClosed`] - Inside the configured cutoff.
    pub fn cancel(&self, reservation_id: ReservationId, actor: UserId) -> Result<Reservation, BookingError> {
        let record = self.record(reservation_id)?;
        self.settle(&record);
        let today = self.today();
        let cutoff = self.config.cancellation_cutoff_days;

        let reservation = record
            .transition(ReservationStatus::Cancelled, |current| {
                if !current.is_party(actor) {
                    return Err(BookingError::Forbidden);
                }
                let window_closed = cutoff.is_some_and(|days| {
                    current.status.is_active() && !before_cutoff(current.dates.check_in(), today, days)
                });
                if window_closed {
                    return Err(BookingError::CancellationWindowClosed);
                }
                Ok(())
            })
            .inspect_err(|e| debug!(reservation = %reservation_id, actor = %actor, error = %e, "cancel rejected"))?;

        self.availability
            .release(reservation.listing_id, reservation.id, &reservation.dates);
        self.events.push(BookingEvent::ReservationCancelled {
            reservation_id,
            by: actor,
        });
        info!(reservation = %reservation_id, by = %actor, "reservation cancelled");
        Ok(reservation)
    }

    /// Ends a confirmed stay.
    ///
    /// [`Completion::Checkout`] requires the checkout date to have passed and
    /// may be requested by the guest, the host or an operator.
    /// [`Completion::OperatorOverride`] ignores the date and is reserved for
    /// the host and the operators named in [`EngineConfig::operators`].
    ///
    /// # Errors
    ///
    /// - [`BookingError::ReservationNotFound`] - Unknown reservation.
    /// - [`BookingError::Forbidden`] - `actor` may not complete this stay this way.
    /// - [`BookingError::CheckoutNotReached`] - Checkout has not passed.
    /// - [`BookingError::AlreadyTerminal`] - Reservation is cancelled or completed.
    /// - [`BookingError::InvalidTransition`] - Reservation is still pending.
    pub fn mark_completed(
        &self,
        reservation_id: ReservationId,
        actor: UserId,
        completion: Completion,
    ) -> Result<Reservation, BookingError> {
        let record = self.record(reservation_id)?;
        let today = self.today();
        let operator = self.config.is_operator(actor);

        let reservation = record
            .transition(ReservationStatus::Completed, |current| {
                let allowed = match completion {
                    Completion::Checkout => operator || current.is_party(actor),
                    Completion::OperatorOverride => operator || actor == current.host_id,
                };
                if !allowed {
                    return Err(BookingError::Forbidden);
                }
                if completion == Completion::Checkout
                    && current.status == ReservationStatus::Confirmed
                    && !checkout_passed(current.dates.check_out(), today)
                {
                    return Err(BookingError::CheckoutNotReached);
                }
                Ok(())
            })
            .inspect_err(|e| {
                debug!(reservation = %reservation_id, actor = %actor, ?completion, error = %e, "completion rejected")
            })?;

        self.on_completed(&reservation, completion);
        Ok(reservation)
    }

    /// Completes every confirmed reservation whose checkout has passed.
    ///
    /// Safe to run repeatedly or concurrently; each reservation is completed
    /// once. Returns the IDs completed by this call.
    pub fn complete_due(&self) -> Vec<ReservationId> {
        let mut completed: Vec<ReservationId> = self
            .records()
            .into_iter()
            .filter_map(|record| self.settle_changed(&record))
            .map(|reservation| reservation.id)
            .collect();
        completed.sort();
        completed
    }

    /// Retrieves a reservation, applying checkout-driven completion first.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::ReservationNotFound`] for unknown IDs.
    pub fn get_reservation(&self, reservation_id: ReservationId) -> Result<Reservation, BookingError> {
        let record = self.record(reservation_id)?;
        Ok(self.settle(&record))
    }

    /// All reservations ordered by ID.
    pub fn reservations(&self) -> Vec<Reservation> {
        self.collect_settled(|_| true)
    }

    pub fn reservations_for_listing(&self, listing_id: ListingId) -> Vec<Reservation> {
        self.collect_settled(|reservation| reservation.listing_id == listing_id)
    }

    pub fn reservations_for_guest(&self, guest_id: UserId) -> Vec<Reservation> {
        self.collect_settled(|reservation| reservation.guest_id == guest_id)
    }

    // === Reviews ===

    /// Whether `guest_id` may review the reservation now.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::ReservationNotFound`] for unknown IDs.
    pub fn can_review(&self, guest_id: UserId, reservation_id: ReservationId) -> Result<Eligibility, BookingError> {
        let record = self.record(reservation_id)?;
        let reservation = self.settle(&record);
        Ok(review::eligibility(
            &reservation,
            guest_id,
            self.reviews.contains(reservation_id),
        ))
    }

    /// Stores a review after passing the eligibility gate.
    ///
    /// # Errors
    ///
    /// - [`BookingError::ReservationNotFound`] - Unknown reservation.
    /// - [`BookingError::InvalidRating`] - Rating outside 1..=5.
    /// - [`BookingError::NotEligible`] - Gate refused, with the reason.
    pub fn submit_review(
        &self,
        guest_id: UserId,
        reservation_id: ReservationId,
        review: NewReview,
    ) -> Result<Review, BookingError> {
        let record = self.record(reservation_id)?;
        let reservation = self.settle(&record);

        let review = self
            .reviews
            .submit(&reservation, guest_id, review)
            .inspect_err(|e| debug!(reservation = %reservation_id, guest = %guest_id, error = %e, "review rejected"))?;

        self.events.push(BookingEvent::ReviewSubmitted {
            review_id: review.id,
            reservation_id,
            listing_id: review.listing_id,
        });
        info!(review = %review.id, reservation = %reservation_id, rating = review.rating, "review submitted");
        Ok(review)
    }

    pub fn reviews_for_listing(&self, listing_id: ListingId) -> Vec<Review> {
        self.reviews.for_listing(listing_id)
    }

    pub fn average_rating(&self, listing_id: ListingId) -> Option<Decimal> {
        self.reviews.average_rating(listing_id)
    }

    // === Events ===

    /// Takes all events recorded since the last drain.
    pub fn drain_events(&self) -> Vec<BookingEvent> {
        self.events.drain()
    }

    // === Internals ===

    fn record(&self, reservation_id: ReservationId) -> Result<Arc<ReservationRecord>, BookingError> {
        self.reservations
            .get(&reservation_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(BookingError::ReservationNotFound)
    }

    /// Snapshot of all records, taken without holding map locks afterwards.
    fn records(&self) -> Vec<Arc<ReservationRecord>> {
        self.reservations
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn collect_settled<P>(&self, predicate: P) -> Vec<Reservation>
    where
        P: Fn(&Reservation) -> bool,
    {
        let mut reservations: Vec<Reservation> = self
            .records()
            .into_iter()
            .map(|record| self.settle(&record))
            .filter(|reservation| predicate(reservation))
            .collect();
        reservations.sort_by_key(|reservation| reservation.id);
        reservations
    }

    fn settle_listing(&self, listing_id: ListingId) {
        for record in self.records() {
            if record.snapshot().listing_id == listing_id {
                self.settle(&record);
            }
        }
    }

    /// Applies lazy completion and returns the current snapshot.
    fn settle(&self, record: &ReservationRecord) -> Reservation {
        self.settle_changed(record)
            .unwrap_or_else(|| record.snapshot())
    }

    /// Applies lazy completion, returning the snapshot only if it changed.
    fn settle_changed(&self, record: &ReservationRecord) -> Option<Reservation> {
        let reservation = record.settle(self.today())?;
        self.on_completed(&reservation, Completion::Checkout);
        Some(reservation)
    }

    /// First stay overlapping `dates` that is still active at `today`.
    ///
    /// Runs under the calendar lock. Stays whose reservation has completed
    /// or been cancelled but not yet released are dropped on the way.
    fn live_conflict(
        &self,
        calendar: &mut ListingCalendar,
        dates: &StayDates,
        today: NaiveDate,
    ) -> Option<ReservationId> {
        while let Some(existing) = calendar.conflict(dates) {
            let Ok(record) = self.record(existing) else {
                return Some(existing);
            };
            let reservation = match record.settle(today) {
                Some(completed) => {
                    self.completion_recorded(&completed, Completion::Checkout);
                    completed
                }
                None => record.snapshot(),
            };
            if reservation.status.is_active() || !calendar.release(existing, &reservation.dates) {
                return Some(existing);
            }
        }
        None
    }

    fn on_completed(&self, reservation: &Reservation, completion: Completion) {
        self.availability
            .release(reservation.listing_id, reservation.id, &reservation.dates);
        self.completion_recorded(reservation, completion);
    }

    fn completion_recorded(&self, reservation: &Reservation, completion: Completion) {
        self.events.push(BookingEvent::ReservationCompleted {
            reservation_id: reservation.id,
            completion,
        });
        info!(reservation = %reservation.id, ?completion, "reservation completed");
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation is open while check-in is more than `days` days away.
fn before_cutoff(check_in: NaiveDate, today: NaiveDate, days: u32) -> bool {
    today
        .checked_add_days(Days::new(u64::from(days)))
        .is_some_and(|cutoff| check_in > cutoff)
}
