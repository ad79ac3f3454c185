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

//! Outbound booking events.
//!
//! The engine records every state change here. Delivery (email, push,
//! payment capture) belongs to whoever drains the queue. The queue is
//! bounded: when nobody drains it, the oldest events are dropped.

use crate::base::{ListingId, ReservationId, ReviewId, UserId};
use crate::reservation::ReservationStatus;
use crossbeam::queue::ArrayQueue;
use serde::Serialize;
use tracing::warn;

/// How a reservation reached `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// Checkout date has passed.
    Checkout,
    /// Operator ended the stay regardless of the date.
    OperatorOverride,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BookingEvent {
    ReservationCreated {
        reservation_id: ReservationId,
        listing_id: ListingId,
        guest_id: UserId,
        status: ReservationStatus,
    },
    ReservationConfirmed {
        reservation_id: ReservationId,
        by: UserId,
    },
    ReservationCancelled {
        reservation_id: ReservationId,
        by: UserId,
    },
    ReservationCompleted {
        reservation_id: ReservationId,
        completion: Completion,
    },
    ReviewSubmitted {
        review_id: ReviewId,
        reservation_id: ReservationId,
        listing_id: ListingId,
    },
    ListingRemoved {
        listing_id: ListingId,
    },
}

impl BookingEvent {
    pub fn reservation_id(&self) -> Option<ReservationId> {
        match self {
            Self::ReservationCreated { reservation_id, .. }
            | Self::ReservationConfirmed { reservation_id, .. }
            | Self::ReservationCancelled { reservation_id, .. }
            | Self::ReservationCompleted { reservation_id, .. }
            | Self::ReviewSubmitted { reservation_id, .. } => Some(*reservation_id),
            Self::ListingRemoved { .. } => None,
        }
    }
}

/// Bounded lock-free FIFO of pending events.
#[derive(Debug)]
pub struct EventQueue {
    events: ArrayQueue<BookingEvent>,
}

impl EventQueue {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Queue holding at most `capacity` events (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Appends `event`, evicting the oldest one when full.
    pub fn push(&self, event: BookingEvent) {
        if let Some(dropped) = self.events.force_push(event) {
            warn!(?dropped, "event queue full, dropping oldest event");
        }
    }

    /// Removes and returns everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<BookingEvent> {
        let mut drained = Vec::with_capacity(self.events.len());
        while let Some(event) = self.events.pop() {
            drained.push(event);
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_order_and_empties_queue() {
        let queue = EventQueue::new();
        queue.push(BookingEvent::ReservationConfirmed {
            reservation_id: ReservationId(1),
            by: UserId(2),
        });
        queue.push(BookingEvent::ListingRemoved {
            listing_id: ListingId(3),
        });

        let events = queue.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].reservation_id(), Some(ReservationId(1)));
        assert_eq!(events[1].reservation_id(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_drops_oldest() {
        let queue = EventQueue::with_capacity(2);
        for id in 1..=3 {
            queue.push(BookingEvent::ListingRemoved {
                listing_id: ListingId(id),
            });
        }

        assert_eq!(
            queue.drain(),
            vec![
                BookingEvent::ListingRemoved { listing_id: ListingId(2) },
                BookingEvent::ListingRemoved { listing_id: ListingId(3) },
            ]
        );
    }

    #[test]
    fn zero_capacity_still_holds_one_event() {
        let queue = EventQueue::with_capacity(0);
        assert_eq!(queue.capacity(), 1);
    }
}
