use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Ride;
use crate::error::{invalid_booking_transition_error, self_booking_forbidden_error, Error};

#[derive(Clone, Debug, Serialize, Deserialize, PolarClass)]
pub struct Booking {
    #[polar(attribute)]
    pub id: Uuid,
    #[polar(attribute)]
    pub ride_id: Uuid,
    #[polar(attribute)]
    pub passenger_id: Uuid,
    pub seats_booked: u32,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

impl Booking {
    pub fn new(
        ride: &Ride,
        passenger_id: Uuid,
        seats_booked: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        if ride.driver_id == passenger_id {
            return Err(self_booking_forbidden_error());
        }

        Ok(Self {
            id: Uuid::new_v4(),
            ride_id: ride.id,
            passenger_id,
            seats_booked,
            status: Status::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Holds seats on its ride.
    pub fn is_active(&self) -> bool {
        self.status != Status::Cancelled
    }

    /// Moves to `next` and reports how many seats the ride gets back.
    #[tracing::instrument]
    pub fn transition(&mut self, next: Status, now: DateTime<Utc>) -> Result<u32, Error> {
        let released = match (self.status, next) {
            (Status::Pending, Status::Confirmed) | (Status::Confirmed, Status::Completed) => 0,
            (Status::Pending, Status::Cancelled) | (Status::Confirmed, Status::Cancelled) => {
                self.seats_booked
            }
            _ => return Err(invalid_booking_transition_error()),
        };

        self.status = next;
        self.updated_at = now;

        Ok(released)
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<u32, Error> {
        self.transition(Status::Cancelled, now)
    }
}

/// Seats held by the bookings that have not been cancelled.
pub fn booked_seats(bookings: &[Booking]) -> u32 {
    bookings
        .iter()
        .filter(|booking| booking.is_active())
        .map(|booking| booking.seats_booked)
        .sum()
}
