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

//! Review eligibility gate and review storage.
//!
//! A guest may review a reservation once: it must be theirs, it must be
//! completed, and no review may exist for it yet.

use crate::base::{ListingId, ReservationId, ReviewId, UserId};
use crate::error::BookingError;
use crate::reservation::{Reservation, ReservationStatus};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub reservation_id: ReservationId,
    pub listing_id: ListingId,
    pub guest_id: UserId,
    pub rating: u8,
    pub comment: String,
}

/// Review content supplied by the guest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewReview {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

impl NewReview {
    pub const MIN_RATING: u8 = 1;
    pub const MAX_RATING: u8 = 5;

    pub fn new(rating: u8, comment: impl Into<String>) -> Self {
        Self {
            rating,
            comment: comment.into(),
        }
    }

    fn validate(&self) -> Result<(), BookingError> {
        if !(Self::MIN_RATING..=Self::MAX_RATING).contains(&self.rating) {
            return Err(BookingError::InvalidRating(self.rating));
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "status", rename_all = "snake_case")]
pub enum IneligibleReason {
    #[error("reservation belongs to another guest")]
    NotGuest,

    #[error("reservation is {0}, not completed")]
    NotCompleted(ReservationStatus),

    #[error("reservation already reviewed")]
    AlreadyReviewed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "eligibility", rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    Ineligible(IneligibleReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Decides eligibility from a settled reservation snapshot.
pub fn eligibility(reservation: &Reservation, guest_id: UserId, already_reviewed: bool) -> Eligibility {
    if reservation.guest_id != guest_id {
        return Eligibility::Ineligible(IneligibleReason::NotGuest);
    }
    if reservation.status != ReservationStatus::Completed {
        return Eligibility::Ineligible(IneligibleReason::NotCompleted(reservation.status));
    }
    if already_reviewed {
        return Eligibility::Ineligible(IneligibleReason::AlreadyReviewed);
    }
    Eligibility::Eligible
}

/// Reviews keyed by reservation, at most one each.
#[derive(Debug)]
pub struct ReviewLog {
    reviews: DashMap<ReservationId, Review>,
    next_id: AtomicU64,
}

impl ReviewLog {
    pub fn new() -> Self {
        Self {
            reviews: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn contains(&self, reservation_id: ReservationId) -> bool {
        self.reviews.contains_key(&reservation_id)
    }

    pub fn get(&self, reservation_id: ReservationId) -> Option<Review> {
        self.reviews.get(&reservation_id).map(|review| review.clone())
    }

    /// Gates and stores a review for `reservation`.
    ///
    /// The eligibility check and the insert happen under the same map entry
    /// lock, so two concurrent submissions for one reservation cannot both
    /// succeed.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidRating`] - Rating outside 1..=5.
    /// - [`BookingError::NotEligible`] - Gate refused the guest.
    pub fn submit(
        &self,
        reservation: &Reservation,
        guest_id: UserId,
        review: NewReview,
    ) -> Result<Review, BookingError> {
        review.validate()?;

        let entry = self.reviews.entry(reservation.id);
        let already_reviewed = matches!(entry, Entry::Occupied(_));
        if let Eligibility::Ineligible(reason) = eligibility(reservation, guest_id, already_reviewed) {
            return Err(BookingError::NotEligible(reason));
        }
        let Entry::Vacant(entry) = entry else {
            return Err(BookingError::NotEligible(IneligibleReason::AlreadyReviewed));
        };

        let stored = Review {
            id: ReviewId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            reservation_id: reservation.id,
            listing_id: reservation.listing_id,
            guest_id,
            rating: review.rating,
            comment: review.comment,
        };
        entry.insert(stored.clone());
        Ok(stored)
    }

    /// Reviews of a listing, oldest first.
    pub fn for_listing(&self, listing_id: ListingId) -> Vec<Review> {
        let mut reviews: Vec<Review> = self
            .reviews
            .iter()
            .filter(|entry| entry.listing_id == listing_id)
            .map(|entry| entry.value().clone())
            .collect();
        reviews.sort_by_key(|review| review.id);
        reviews
    }

    /// Mean rating of a listing, `None` without reviews.
    pub fn average_rating(&self, listing_id: ListingId) -> Option<Decimal> {
        let (sum, count) = self
            .reviews
            .iter()
            .filter(|entry| entry.listing_id == listing_id)
            .fold((0u64, 0u64), |(sum, count), entry| {
                (sum + u64::from(entry.rating), count + 1)
            });
        if count == 0 {
            return None;
        }
        Some(Decimal::from(sum) / Decimal::from(count))
    }
}

impl Default for ReviewLog {
    fn default() -> Self {
        Self::new()
    }
}
