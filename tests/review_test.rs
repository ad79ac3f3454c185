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

//! Review eligibility gate integration tests.

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use stay_booking_rs::{
    BookingError, BookingRequest, Completion, Eligibility, Engine, FixedClock, IneligibleReason,
    NewListing, NewReview, Reservation, ReservationId, ReservationStatus, UserId,
};
use std::sync::Arc;

const HOST: UserId = UserId(1);
const GUEST: UserId = UserId(2);
const OTHER_GUEST: UserId = UserId(3);

fn july(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
}

fn setup() -> (Engine, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(july(1)));
    let engine = Engine::with_clock(clock.clone());
    (engine, clock)
}

fn confirmed_stay(engine: &Engine, guest: UserId, from: u32, to: u32) -> Reservation {
    let listing = engine
        .create_listing(NewListing::new(HOST, dec!(120), 4).titled("Loft", "Lisbon"))
        .unwrap();
    let reservation = engine
        .request_booking(BookingRequest {
            listing_id: listing.id,
            guest_id: guest,
            check_in: july(from),
            check_out: july(to),
            guest_count: 2,
        })
        .unwrap();
    engine.confirm(reservation.id, HOST).unwrap()
}

fn ineligible(reason: IneligibleReason) -> Result<Eligibility, BookingError> {
    Ok(Eligibility::Ineligible(reason))
}

#[test]
fn eligibility_opens_once_after_completion() {
    let (engine, _clock) = setup();
    let reservation = confirmed_stay(&engine, GUEST, 10, 12);

    assert_eq!(
        engine.can_review(GUEST, reservation.id),
        ineligible(IneligibleReason::NotCompleted(ReservationStatus::Confirmed))
    );

    engine
        .mark_completed(reservation.id, HOST, Completion::OperatorOverride)
        .unwrap();
    assert_eq!(engine.can_review(GUEST, reservation.id), Ok(Eligibility::Eligible));

    engine
        .submit_review(GUEST, reservation.id, NewReview::new(5, "Great stay"))
        .unwrap();
    assert_eq!(
        engine.can_review(GUEST, reservation.id),
        ineligible(IneligibleReason::AlreadyReviewed)
    );
}

#[test]
fn checkout_passing_makes_stay_reviewable() {
    let (engine, clock) = setup();
    let reservation = confirmed_stay(&engine, GUEST, 2, 4);

    clock.set(july(4));
    assert!(!engine.can_review(GUEST, reservation.id).unwrap().is_eligible());

    clock.set(july(5));
    assert!(engine.can_review(GUEST, reservation.id).unwrap().is_eligible());
}

#[test]
fn review_before_completion_is_refused() {
    let (engine, _clock) = setup();
    let reservation = confirmed_stay(&engine, GUEST, 10, 12);

    let result = engine.submit_review(GUEST, reservation.id, NewReview::new(4, ""));
    assert_eq!(
        result,
        Err(BookingError::NotEligible(IneligibleReason::NotCompleted(
            ReservationStatus::Confirmed
        )))
    );
    assert!(engine.reviews_for_listing(reservation.listing_id).is_empty());
}

#[test]
fn cancelled_stay_is_never_reviewable() {
    let (engine, clock) = setup();
    let reservation = confirmed_stay(&engine, GUEST, 10, 12);
    engine.cancel(reservation.id, GUEST).unwrap();

    clock.set(july(20));
    assert_eq!(
        engine.can_review(GUEST, reservation.id),
        ineligible(IneligibleReason::NotCompleted(ReservationStatus::Cancelled))
    );
}

#[test]
fn only_the_guest_may_review() {
    let (engine, _clock) = setup();
    let reservation = confirmed_stay(&engine, GUEST, 10, 12);
    engine
        .mark_completed(reservation.id, HOST, Completion::OperatorOverride)
        .unwrap();

    for actor in [HOST, OTHER_GUEST] {
        assert_eq!(
            engine.can_review(actor, reservation.id),
            ineligible(IneligibleReason::NotGuest)
        );
        assert_eq!(
            engine
                .submit_review(actor, reservation.id, NewReview::new(1, "no"))
                .map(|review| review.id),
            Err(BookingError::NotEligible(IneligibleReason::NotGuest))
        );
    }
}

#[test]
fn rating_out_of_range_is_invalid() {
    let (engine, _clock) = setup();
    let reservation = confirmed_stay(&engine, GUEST, 10, 12);
    engine
        .mark_completed(reservation.id, HOST, Completion::OperatorOverride)
        .unwrap();

    for rating in [0, 6] {
        assert_eq!(
            engine
                .submit_review(GUEST, reservation.id, NewReview::new(rating, ""))
                .map(|review| review.id),
            Err(BookingError::InvalidRating(rating))
        );
    }
    assert!(engine.can_review(GUEST, reservation.id).unwrap().is_eligible());
}

#[test]
fn unknown_reservation_is_not_found() {
    let (engine, _clock) = setup();
    assert_eq!(
        engine.can_review(GUEST, ReservationId(404)),
        Err(BookingError::ReservationNotFound)
    );
}

#[test]
fn average_rating_over_listing_reviews() {
    let (engine, clock) = setup();
    let listing = engine
        .create_listing(NewListing::new(HOST, dec!(80), 2).instant_book(true))
        .unwrap();
    assert_eq!(engine.average_rating(listing.id), None);

    let mut ids = Vec::new();
    for (guest, from) in [(UserId(10), 2), (UserId(11), 4), (UserId(12), 6)] {
        let reservation = engine
            .request_booking(BookingRequest {
                listing_id: listing.id,
                guest_id: guest,
                check_in: july(from),
                check_out: july(from + 2),
                guest_count: 1,
            })
            .unwrap();
        ids.push((guest, reservation.id));
    }

    clock.set(july(15));
    for ((guest, id), rating) in ids.into_iter().zip([5, 4, 4]) {
        engine
            .submit_review(guest, id, NewReview::new(rating, "ok"))
            .unwrap();
    }

    let reviews = engine.reviews_for_listing(listing.id);
    assert_eq!(reviews.len(), 3);
    assert_eq!(reviews[0].rating, 5);
    assert_eq!(engine.average_rating(listing.id).map(|avg| avg.round_dp(2)), Some(dec!(4.33)));
}
