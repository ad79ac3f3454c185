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

//! Listing registry.
//!
//! Holds the facts about each rentable unit. Owner-side updates replace the
//! stored listing in place; reservations keep their own price snapshot, so
//! nothing here reaches back into existing bookings.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use stay_booking_rs::{ListingRegistry, NewListing, UserId};
//!
//! let registry = ListingRegistry::new();
//! let listing = registry
//!     .create(NewListing::new(UserId(1), dec!(100), 4), 50)
//!     .unwrap();
//! assert!(registry.is_bookable(listing.id));
//! ```

use crate::base::{ListingId, UserId};
use crate::error::BookingError;
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub id: ListingId,
    pub owner_id: UserId,
    pub title: String,
    pub location: String,
    pub nightly_price: Decimal,
    pub max_guests: u32,
    /// Host-controlled switch, independent of existing bookings.
    pub available: bool,
    pub instant_book: bool,
}

/// Fields supplied by a host when creating a listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewListing {
    pub owner_id: UserId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    pub nightly_price: Decimal,
    pub max_guests: u32,
    #[serde(default)]
    pub instant_book: bool,
}

impl NewListing {
    pub fn new(owner_id: UserId, nightly_price: Decimal, max_guests: u32) -> Self {
        Self {
            owner_id,
            title: String::new(),
            location: String::new(),
            nightly_price,
            max_guests,
            instant_book: false,
        }
    }

    pub fn titled(mut self, title: impl Into<String>, location: impl Into<String>) -> Self {
        self.title = title.into();
        self.location = location.into();
        self
    }

    pub fn instant_book(mut self, instant_book: bool) -> Self {
        self.instant_book = instant_book;
        self
    }
}

/// Partial owner update; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListingUpdate {
    pub title: Option<String>,
    pub location: Option<String>,
    pub nightly_price: Option<Decimal>,
    pub max_guests: Option<u32>,
    pub available: Option<bool>,
    pub instant_book: Option<bool>,
}

/// Largest nightly price a listing may declare.
pub const MAX_NIGHTLY_PRICE: Decimal = dec!(99999999.99);

/// Prices are whole cents in `0.01..=MAX_NIGHTLY_PRICE`.
fn validate_price(price: Decimal) -> Result<(), BookingError> {
    if price <= Decimal::ZERO || price > MAX_NIGHTLY_PRICE || price.normalize().scale() > 2 {
        return Err(BookingError::InvalidPrice);
    }
    Ok(())
}

fn validate_capacity(max_guests: u32, limit: u32) -> Result<(), BookingError> {
    if max_guests == 0 || max_guests > limit {
        return Err(BookingError::InvalidCapacity { max: limit });
    }
    Ok(())
}

/// Concurrent store of listings keyed by ID.
#[derive(Debug)]
pub struct ListingRegistry {
    listings: DashMap<ListingId, Listing>,
    next_id: AtomicU32,
}

impl ListingRegistry {
    pub fn new() -> Self {
        Self {
            listings: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Registers a new listing, open for booking.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidPrice`] - Nightly price outside `0.01..=MAX_NIGHTLY_PRICE`.
    /// - [`BookingError::InvalidCapacity`] - Capacity is zero or above `max_guests_limit`.
    pub fn create(&self, new: NewListing, max_guests_limit: u32) -> Result<Listing, BookingError> {
        validate_price(new.nightly_price)?;
        validate_capacity(new.max_guests, max_guests_limit)?;

        let id = ListingId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listing = Listing {
            id,
            owner_id: new.owner_id,
            title: new.title,
            location: new.location,
            nightly_price: new.nightly_price,
            max_guests: new.max_guests,
            available: true,
            instant_book: new.instant_book,
        };
        self.listings.insert(id, listing.clone());
        Ok(listing)
    }

    /// Returns a snapshot of the listing.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::ListingNotFound`] for unknown IDs.
    pub fn get(&self, listing_id: ListingId) -> Result<Listing, BookingError> {
        self.listings
            .get(&listing_id)
            .map(|listing| listing.clone())
            .ok_or(BookingError::ListingNotFound)
    }

    /// True iff the listing exists and its availability flag is set.
    pub fn is_bookable(&self, listing_id: ListingId) -> bool {
        self.listings
            .get(&listing_id)
            .is_some_and(|listing| listing.available)
    }

    /// Applies an owner update.
    ///
    /// The whole update is validated before any field changes.
    ///
    /// # Errors
    ///
    /// - [`BookingError::ListingNotFound`] - Unknown listing.
    /// - [`BookingError::Forbidden`] - `actor` does not own the listing.
    /// - [`BookingError::InvalidPrice`] / [`BookingError::InvalidCapacity`] - Bad new values.
    pub fn update(
        &self,
        listing_id: ListingId,
        actor: UserId,
        update: ListingUpdate,
        max_guests_limit: u32,
    ) -> Result<Listing, BookingError> {
        let mut listing = self
            .listings
            .get_mut(&listing_id)
            .ok_or(BookingError::ListingNotFound)?;
        if listing.owner_id != actor {
            return Err(BookingError::Forbidden);
        }
        if let Some(price) = update.nightly_price {
            validate_price(price)?;
        }
        if let Some(max_guests) = update.max_guests {
            validate_capacity(max_guests, max_guests_limit)?;
        }

        if let Some(title) = update.title {
            listing.title = title;
        }
        if let Some(location) = update.location {
            listing.location = location;
        }
        if let Some(price) = update.nightly_price {
            listing.nightly_price = price;
        }
        if let Some(max_guests) = update.max_guests {
            listing.max_guests = max_guests;
        }
        if let Some(available) = update.available {
            listing.available = available;
        }
        if let Some(instant_book) = update.instant_book {
            listing.instant_book = instant_book;
        }
        Ok(listing.clone())
    }

    /// Deletes a listing owned by `actor`.
    ///
    /// Callers must make sure no active reservation references it.
    ///
    /// # Errors
    ///
    /// - [`BookingError::ListingNotFound`] - Unknown listing.
    /// - [`BookingError::Forbidden`] - `actor` does not own the listing.
    pub(crate) fn remove(&self, listing_id: ListingId, actor: UserId) -> Result<Listing, BookingError> {
        self.listings
            .remove_if(&listing_id, |_, listing| listing.owner_id == actor)
            .map(|(_, listing)| listing)
            .ok_or_else(|| {
                if self.listings.contains_key(&listing_id) {
                    BookingError::Forbidden
                } else {
                    BookingError::ListingNotFound
                }
            })
    }

    /// All listings ordered by ID.
    pub fn listings(&self) -> Vec<Listing> {
        let mut listings: Vec<Listing> = self
            .listings
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        listings.sort_by_key(|listing| listing.id);
        listings
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

impl Default for ListingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
