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

//! Pricing engine.
//!
//! `total = nightly_price * nights`. The quote depends only on its
//! arguments, so it can be recomputed at any time to verify a stored
//! reservation price.

use crate::base::StayDates;
use crate::error::BookingError;
use crate::listing::Listing;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub nights: u32,
    pub nightly_price: Decimal,
    pub total: Decimal,
}

/// Prices a stay at `listing`.
///
/// # Errors
///
/// - [`BookingError::InvalidDateRange`] - `check_out <= check_in`.
/// - [`BookingError::InvalidGuestCount`] - `guest_count` is zero.
/// - [`BookingError::GuestCountExceeded`] - More guests than the listing allows.
/// - [`BookingError::TotalOverflow`] - Total does not fit in a [`Decimal`].
pub fn quote(
    listing: &Listing,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guest_count: u32,
) -> Result<Quote, BookingError> {
    let dates = StayDates::new(check_in, check_out)?;
    quote_stay(listing, &dates, guest_count)
}

pub(crate) fn quote_stay(
    listing: &Listing,
    dates: &StayDates,
    guest_count: u32,
) -> Result<Quote, BookingError> {
    if guest_count == 0 {
        return Err(BookingError::InvalidGuestCount);
    }
    if guest_count > listing.max_guests {
        return Err(BookingError::GuestCountExceeded {
            requested: guest_count,
            max: listing.max_guests,
        });
    }

    let nights = dates.nights();
    let total = listing
        .nightly_price
        .checked_mul(Decimal::from(nights))
        .ok_or(BookingError::TotalOverflow)?;
    Ok(Quote {
        nights,
        nightly_price: listing.nightly_price,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{ListingId, UserId};
    use rust_decimal_macros::dec;

    fn make_listing(price: Decimal, max_guests: u32) -> Listing {
        Listing {
            id: ListingId(1),
            owner_id: UserId(1),
            title: String::new(),
            location: String::new(),
            nightly_price: price,
            max_guests,
            available: true,
            instant_book: false,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn four_nights_at_hundred() {
        let listing = make_listing(dec!(100), 4);
        let quote = quote(&listing, date(2024, 7, 1), date(2024, 7, 5), 2).unwrap();
        assert_eq!(quote.nights, 4);
        assert_eq!(quote.total, dec!(400));
    }

    #[test]
    fn fractional_price_is_exact() {
        let listing = make_listing(dec!(89.99), 2);
        let quote = quote(&listing, date(2024, 2, 27), date(2024, 3, 1), 1).unwrap();
        // 2024 is a leap year: 27th, 28th, 29th.
        assert_eq!(quote.nights, 3);
        assert_eq!(quote.total, dec!(269.97));
    }

    #[test]
    fn guest_count_at_capacity_is_allowed() {
        let listing = make_listing(dec!(100), 4);
        assert!(quote(&listing, date(2024, 7, 1), date(2024, 7, 2), 4).is_ok());
    }

    #[test]
    fn guest_count_above_capacity() {
        let listing = make_listing(dec!(100), 4);
        let result = quote(&listing, date(2024, 7, 1), date(2024, 7, 2), 5);
        assert_eq!(
            result,
            Err(BookingError::GuestCountExceeded {
                requested: 5,
                max: 4
            })
        );
    }

    #[test]
    fn zero_guests_rejected() {
        let listing = make_listing(dec!(100), 4);
        let result = quote(&listing, date(2024, 7, 1), date(2024, 7, 2), 0);
        assert_eq!(result, Err(BookingError::InvalidGuestCount));
    }

    #[test]
    fn overflowing_total_is_an_error() {
        let listing = make_listing(Decimal::MAX, 4);
        let result = quote(&listing, date(2024, 7, 1), date(2024, 7, 3), 1);
        assert_eq!(result, Err(BookingError::TotalOverflow));
    }

    #[test]
    fn maximum_price_over_a_long_stay_fits() {
        let listing = make_listing(crate::listing::MAX_NIGHTLY_PRICE, 4);
        let quote = quote(&listing, date(2024, 1, 1), date(2034, 1, 1), 1).unwrap();
        assert_eq!(quote.total, dec!(99999999.99) * Decimal::from(quote.nights));
    }

    #[test]
    fn same_day_range_rejected() {
        let listing = make_listing(dec!(100), 4);
        let result = quote(&listing, date(2024, 7, 1), date(2024, 7, 1), 1);
        assert_eq!(result, Err(BookingError::InvalidDateRange));
    }
}
