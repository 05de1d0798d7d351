use chrono::{DateTime, Duration, Utc};
use oso::PolarClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::ride_request::MAX_SEATS;
use crate::error::{
    invalid_input_error, ride_not_active_error, seats_unavailable_error, unexpected_error, Error,
};

/// Two active rides by the same driver must depart at least this far apart.
pub const SCHEDULE_CONFLICT_WINDOW_HOURS: i64 = 2;

#[derive(Clone, Debug, Serialize, Deserialize, PolarClass)]
pub struct Ride {
    #[polar(attribute)]
    pub id: Uuid,
    #[polar(attribute)]
    pub driver_id: Uuid,
    pub origin_city_id: Uuid,
    pub destination_city_id: Uuid,
    pub departure_time: DateTime<Utc>,
    pub total_seats: u32,
    pub available_seats: u32,
    pub price_per_seat: Decimal,
    pub description: Option<String>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    Cancelled,
    Completed,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewRide {
    pub origin_city_id: Uuid,
    pub destination_city_id: Uuid,
    pub departure_time: DateTime<Utc>,
    pub total_seats: u32,
    pub price_per_seat: Decimal,
    pub description: Option<String>,
}

impl Ride {
    pub fn new(driver_id: Uuid, params: NewRide, now: DateTime<Utc>) -> Result<Self, Error> {
        if params.origin_city_id == params.destination_city_id {
            return Err(invalid_input_error("origin and destination must differ"));
        }

        if params.departure_time <= now {
            return Err(invalid_input_error("departure time must be in the future"));
        }

        if params.total_seats == 0 || params.total_seats > MAX_SEATS {
            return Err(invalid_input_error(format!(
                "total seats must be between 1 and {}",
                MAX_SEATS
            )));
        }

        if params.price_per_seat <= Decimal::ZERO {
            return Err(invalid_input_error("price per seat must be positive"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            driver_id,
            origin_city_id: params.origin_city_id,
            destination_city_id: params.destination_city_id,
            departure_time: params.departure_time,
            total_seats: params.total_seats,
            available_seats: params.total_seats,
            price_per_seat: params.price_per_seat,
            description: params.description,
            status: Status::Active,
            created_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// Whether this ride blocks another departure at `departure_time` for the same driver.
    pub fn conflicts_with(&self, departure_time: DateTime<Utc>) -> bool {
        let window = Duration::hours(SCHEDULE_CONFLICT_WINDOW_HOURS);

        self.is_active()
            && departure_time > self.departure_time - window
            && departure_time < self.departure_time + window
    }

    pub fn booked_seats(&self) -> u32 {
        self.total_seats - self.available_seats
    }

    #[tracing::instrument]
    pub fn reserve_seats(&mut self, seats: u32) -> Result<(), Error> {
        if !self.is_active() {
            return Err(ride_not_active_error());
        }

        if seats == 0 {
            return Err(invalid_input_error("at least one seat must be booked"));
        }

        if seats > self.available_seats {
            return Err(seats_unavailable_error());
        }

        self.available_seats -= seats;
        Ok(())
    }

    #[tracing::instrument]
    pub fn release_seats(&mut self, seats: u32) -> Result<(), Error> {
        if seats > self.booked_seats() {
            tracing::error!("releasing more seats than are booked");
            return Err(unexpected_error());
        }

        self.available_seats += seats;
        Ok(())
    }

    #[tracing::instrument]
    pub fn cancel(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Active => {
                self.status = Status::Cancelled;
                Ok(())
            }
            _ => Err(ride_not_active_error()),
        }
    }

    #[tracing::instrument]
    pub fn complete(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Active => {
                self.status = Status::Completed;
                Ok(())
            }
            _ => Err(ride_not_active_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn ride(now: DateTime<Utc>, seats: u32) -> Ride {
        Ride::new(
            Uuid::new_v4(),
            NewRide {
                origin_city_id: Uuid::new_v4(),
                destination_city_id: Uuid::new_v4(),
                departure_time: now + Duration::days(1),
                total_seats: seats,
                price_per_seat: dec!(12.50),
                description: None,
            },
            now,
        )
        .unwrap()
    }

    #[test]
    fn starts_with_every_seat_available() {
        let ride = ride(Utc::now(), 4);

        assert_eq!(ride.available_seats, 4);
        assert_eq!(ride.booked_seats(), 0);
        assert!(ride.is_active());
    }

    #[test]
    fn cannot_reserve_more_than_available() {
        let mut ride = ride(Utc::now(), 4);
        ride.reserve_seats(3).unwrap();

        let err = ride.reserve_seats(2).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InsufficientResource);
        assert_eq!(ride.available_seats, 1);
    }

    #[test]
    fn release_restores_seats_but_never_past_total() {
        let mut ride = ride(Utc::now(), 4);
        ride.reserve_seats(2).unwrap();
        ride.release_seats(2).unwrap();

        assert_eq!(ride.available_seats, 4);
        assert!(ride.release_seats(1).is_err());
    }

    #[test]
    fn conflict_window_is_two_hours_either_side() {
        let now = Utc::now();
        let ride = ride(now, 2);
        let departure = ride.departure_time;

        assert!(ride.conflicts_with(departure + Duration::minutes(119)));
        assert!(ride.conflicts_with(departure - Duration::minutes(119)));
        assert!(!ride.conflicts_with(departure + Duration::hours(2)));
        assert!(!ride.conflicts_with(departure - Duration::hours(3)));
    }

    #[test]
    fn cancelled_ride_neither_conflicts_nor_books() {
        let now = Utc::now();
        let mut ride = ride(now, 2);
        ride.cancel().unwrap();

        assert!(!ride.conflicts_with(ride.departure_time));
        assert_eq!(
            ride.reserve_seats(1).unwrap_err().kind,
            ErrorKind::InvalidState
        );
    }
}
