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

//! Availability index.
//!
//! Each listing has a calendar of its active (pending or confirmed) stays,
//! keyed by check-in date. Active stays never overlap, so they are also
//! ordered by checkout, and a conflict check only needs to look at the last
//! stay starting before the requested checkout:
//!
//! ```text
//!   stays:      [1 ── 3)      [5 ──── 7)
//!   request:          [3 ── 5)              -> free (back-to-back)
//!   request:        [2 ───────── 6)         -> conflict with [5, 7)
//! ```
//!
//! Calendars sit behind a per-listing lock. The booking path runs its
//! check-then-insert inside [`AvailabilityIndex::with_calendar`], so two
//! requests for the same listing are serialized while other listings
//! proceed in parallel.

use crate::base::{ListingId, ReservationId, StayDates};
use crate::error::BookingError;
use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Conflict(ReservationId),
}

#[derive(Debug, Clone, Copy)]
struct BookedStay {
    reservation_id: ReservationId,
    check_out: NaiveDate,
}

/// Active stays of a single listing.
#[derive(Debug, Default)]
pub struct ListingCalendar {
    stays: BTreeMap<NaiveDate, BookedStay>,
}

impl ListingCalendar {
    /// Reservation overlapping `dates`, if any.
    pub fn conflict(&self, dates: &StayDates) -> Option<ReservationId> {
        self.stays
            .range(..dates.check_out())
            .next_back()
            .filter(|(_, stay)| stay.check_out > dates.check_in())
            .map(|(_, stay)| stay.reservation_id)
    }

    /// Occupies `dates`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::DateConflict`] if the range is taken.
    pub fn insert(&mut self, reservation_id: ReservationId, dates: &StayDates) -> Result<(), BookingError> {
        if let Some(existing) = self.conflict(dates) {
            return Err(BookingError::DateConflict(existing));
        }
        self.stays.insert(
            dates.check_in(),
            BookedStay {
                reservation_id,
                check_out: dates.check_out(),
            },
        );
        Ok(())
    }

    /// Frees `dates` if they are held by `reservation_id`.
    pub fn release(&mut self, reservation_id: ReservationId, dates: &StayDates) -> bool {
        match self.stays.get(&dates.check_in()) {
            Some(stay) if stay.reservation_id == reservation_id => {
                self.stays.remove(&dates.check_in());
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.stays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stays.is_empty()
    }
}

/// Per-listing calendars of active stays.
#[derive(Debug, Default)]
pub struct AvailabilityIndex {
    calendars: DashMap<ListingId, Arc<Mutex<ListingCalendar>>>,
}

impl AvailabilityIndex {
    pub fn new() -> Self {
        Self {
            calendars: DashMap::new(),
        }
    }

    fn calendar(&self, listing_id: ListingId) -> Arc<Mutex<ListingCalendar>> {
        // Clone the Arc out so the map shard is not held while the
        // calendar lock is taken.
        Arc::clone(&self.calendars.entry(listing_id).or_default())
    }

    /// Point-in-time answer for `dates`; may be stale by the time it returns.
    pub fn check(&self, listing_id: ListingId, dates: &StayDates) -> Availability {
        let Some(calendar) = self
            .calendars
            .get(&listing_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            return Availability::Available;
        };
        let calendar = calendar.lock();
        match calendar.conflict(dates) {
            Some(reservation_id) => Availability::Conflict(reservation_id),
            None => Availability::Available,
        }
    }

    /// Runs `f` under the calendar lock of a listing that already has one.
    ///
    /// Returns `None` without creating a calendar when the listing has none.
    pub fn inspect<T, F>(&self, listing_id: ListingId, f: F) -> Option<T>
    where
        F: FnOnce(&mut ListingCalendar) -> T,
    {
        let calendar = self
            .calendars
            .get(&listing_id)
            .map(|entry| Arc::clone(entry.value()))?;
        let mut calendar = calendar.lock();
        Some(f(&mut calendar))
    }

    /// Runs `f` while holding the listing's calendar lock.
    ///
    /// Everything `f` observes and inserts is atomic with respect to other
    /// callers for the same listing.
    pub fn with_calendar<T, F>(&self, listing_id: ListingId, f: F) -> Result<T, BookingError>
    where
        F: FnOnce(&mut ListingCalendar) -> Result<T, BookingError>,
    {
        let calendar = self.calendar(listing_id);
        let mut calendar = calendar.lock();
        f(&mut calendar)
    }

    /// Frees a stay once its reservation leaves the active states.
    pub fn release(&self, listing_id: ListingId, reservation_id: ReservationId, dates: &StayDates) -> bool {
        let Some(calendar) = self
            .calendars
            .get(&listing_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            return false;
        };
        let released = calendar.lock().release(reservation_id, dates);
        released
    }

    /// Number of active stays on the listing.
    pub fn active_count(&self, listing_id: ListingId) -> usize {
        self.calendars
            .get(&listing_id)
            .map(|entry| Arc::clone(entry.value()))
            .map_or(0, |calendar| calendar.lock().len())
    }

    /// Drops the calendar of a removed listing.
    pub(crate) fn forget(&self, listing_id: ListingId) {
        self.calendars
            .remove_if(&listing_id, |_, calendar| calendar.lock().is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stay(from: u32, to: u32) -> StayDates {
        StayDates::new(
            NaiveDate::from_ymd_opt(2024, 7, from).unwrap(),
            NaiveDate::from_ymd_opt(2024, 7, to).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn empty_calendar_is_free() {
        let index = AvailabilityIndex::new();
        assert_eq!(index.check(ListingId(1), &stay(1, 5)), Availability::Available);
    }

    #[test]
    fn overlap_reports_conflicting_reservation() {
        let mut calendar = ListingCalendar::default();
        calendar.insert(ReservationId(1), &stay(1, 5)).unwrap();

        assert_eq!(calendar.conflict(&stay(4, 6)), Some(ReservationId(1)));
        assert_eq!(calendar.conflict(&stay(2, 3)), Some(ReservationId(1)));
        assert_eq!(calendar.conflict(&stay(1, 10)), Some(ReservationId(1)));
    }

    #[test]
    fn back_to_back_is_free() {
        let mut calendar = ListingCalendar::default();
        calendar.insert(ReservationId(1), &stay(3, 5)).unwrap();

        assert_eq!(calendar.conflict(&stay(5, 6)), None);
        assert_eq!(calendar.conflict(&stay(1, 3)), None);
    }

    #[test]
    fn gap_between_stays() {
        let mut calendar = ListingCalendar::default();
        calendar.insert(ReservationId(1), &stay(1, 3)).unwrap();
        calendar.insert(ReservationId(2), &stay(5, 7)).unwrap();

        assert_eq!(calendar.conflict(&stay(3, 5)), None);
        assert_eq!(calendar.conflict(&stay(2, 6)), Some(ReservationId(2)));
        assert_eq!(calendar.conflict(&stay(6, 9)), Some(ReservationId(2)));
        assert_eq!(calendar.conflict(&stay(7, 9)), None);
    }

    #[test]
    fn insert_refuses_overlap() {
        let mut calendar = ListingCalendar::default();
        calendar.insert(ReservationId(1), &stay(1, 5)).unwrap();
        assert_eq!(
            calendar.insert(ReservationId(2), &stay(4, 6)),
            Err(BookingError::DateConflict(ReservationId(1)))
        );
        assert_eq!(calendar.len(), 1);
    }

    #[test]
    fn release_only_matching_reservation() {
        let mut calendar = ListingCalendar::default();
        calendar.insert(ReservationId(1), &stay(1, 5)).unwrap();

        assert!(!calendar.release(ReservationId(2), &stay(1, 5)));
        assert!(calendar.release(ReservationId(1), &stay(1, 5)));
        assert!(calendar.is_empty());
        assert!(!calendar.release(ReservationId(1), &stay(1, 5)));
    }

    #[test]
    fn release_through_index_frees_dates() {
        let index = AvailabilityIndex::new();
        index
            .with_calendar(ListingId(1), |calendar| {
                calendar.insert(ReservationId(7), &stay(1, 5))
            })
            .unwrap();
        assert_eq!(
            index.check(ListingId(1), &stay(2, 3)),
            Availability::Conflict(ReservationId(7))
        );

        assert!(index.release(ListingId(1), ReservationId(7), &stay(1, 5)));
        assert_eq!(index.check(ListingId(1), &stay(2, 3)), Availability::Available);
        assert_eq!(index.active_count(ListingId(1)), 0);
    }

    #[test]
    fn inspect_does_not_create_calendars() {
        let index = AvailabilityIndex::new();
        assert_eq!(index.inspect(ListingId(1), |calendar| calendar.len()), None);
        index
            .with_calendar(ListingId(1), |calendar| {
                calendar.insert(ReservationId(1), &stay(1, 5))
            })
            .unwrap();
        assert_eq!(index.inspect(ListingId(1), |calendar| calendar.len()), Some(1));
    }

    #[test]
    fn listings_are_independent() {
        let index = AvailabilityIndex::new();
        index
            .with_calendar(ListingId(1), |calendar| {
                calendar.insert(ReservationId(1), &stay(1, 5))
            })
            .unwrap();
        assert_eq!(index.check(ListingId(2), &stay(1, 5)), Availability::Available);
    }
}
