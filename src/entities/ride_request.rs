use chrono::{DateTime, Duration, Utc};
use oso::PolarClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{
    budget_violation_error, invalid_input_error, request_expired_error, request_not_open_error,
    time_window_violation_error, Error,
};

pub const MAX_TIME_FLEXIBILITY_HOURS: u32 = 72;
pub const MAX_SEATS: u32 = 8;

#[derive(Clone, Debug, Serialize, Deserialize, PolarClass)]
pub struct RideRequest {
    #[polar(attribute)]
    pub id: Uuid,
    #[polar(attribute)]
    pub passenger_id: Uuid,
    pub origin_city_id: Uuid,
    pub destination_city_id: Uuid,
    pub preferred_date_time: DateTime<Utc>,
    pub time_flexibility: u32,
    pub seats_needed: u32,
    pub min_budget: Option<Decimal>,
    pub max_budget: Option<Decimal>,
    pub notes: Option<String>,
    pub status: Status,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    Closed,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Attributes a passenger supplies when asking for a ride.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewRideRequest {
    pub origin_city_id: Uuid,
    pub destination_city_id: Uuid,
    pub preferred_date_time: DateTime<Utc>,
    #[serde(default)]
    pub time_flexibility: u32,
    #[serde(default = "default_seats")]
    pub seats_needed: u32,
    pub min_budget: Option<Decimal>,
    pub max_budget: Option<Decimal>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_seats() -> u32 {
    1
}

impl RideRequest {
    pub fn new(
        passenger_id: Uuid,
        params: NewRideRequest,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        if params.origin_city_id == params.destination_city_id {
            return Err(invalid_input_error("origin and destination must differ"));
        }

        if params.preferred_date_time <= now {
            return Err(invalid_input_error(
                "preferred date and time must be in the future",
            ));
        }

        if params.time_flexibility > MAX_TIME_FLEXIBILITY_HOURS {
            return Err(invalid_input_error(format!(
                "time flexibility cannot exceed {} hours",
                MAX_TIME_FLEXIBILITY_HOURS
            )));
        }

        if params.seats_needed == 0 || params.seats_needed > MAX_SEATS {
            return Err(invalid_input_error(format!(
                "seats needed must be between 1 and {}",
                MAX_SEATS
            )));
        }

        for budget in [params.min_budget, params.max_budget].iter().flatten() {
            if *budget <= Decimal::ZERO {
                return Err(invalid_input_error("budget must be positive"));
            }
        }

        if let (Some(min), Some(max)) = (params.min_budget, params.max_budget) {
            if min > max {
                return Err(invalid_input_error(
                    "minimum budget cannot exceed maximum budget",
                ));
            }
        }

        let latest_departure =
            params.preferred_date_time + Duration::hours(i64::from(params.time_flexibility));

        let expires_at = match params.expires_at {
            Some(expires_at) if expires_at <= now => {
                return Err(invalid_input_error("expiry must be in the future"));
            }
            Some(expires_at) => expires_at.min(latest_departure),
            None => latest_departure,
        };

        Ok(Self {
            id: Uuid::new_v4(),
            passenger_id,
            origin_city_id: params.origin_city_id,
            destination_city_id: params.destination_city_id,
            preferred_date_time: params.preferred_date_time,
            time_flexibility: params.time_flexibility,
            seats_needed: params.seats_needed,
            min_budget: params.min_budget,
            max_budget: params.max_budget,
            notes: params.notes,
            status: Status::Open,
            expires_at,
            created_at: now,
        })
    }

    pub fn is_open(&self) -> bool {
        self.status == Status::Open
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Open and not past its deadline.
    pub fn is_biddable(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && !self.is_expired(now)
    }

    pub fn ensure_biddable(&self, now: DateTime<Utc>) -> Result<(), Error> {
        if !self.is_open() {
            return Err(request_not_open_error());
        }

        if self.is_expired(now) {
            return Err(request_expired_error());
        }

        Ok(())
    }

    /// Checks an offer against the budget bounds and the flexibility window.
    pub fn check_offer(
        &self,
        price_offer: Decimal,
        proposed_date_time: Option<DateTime<Utc>>,
    ) -> Result<(), Error> {
        if price_offer <= Decimal::ZERO {
            return Err(invalid_input_error("price offer must be positive"));
        }

        if let Some(min) = self.min_budget {
            if price_offer < min {
                return Err(budget_violation_error());
            }
        }

        if let Some(max) = self.max_budget {
            if price_offer > max {
                return Err(budget_violation_error());
            }
        }

        if let Some(proposed) = proposed_date_time {
            let flexibility = Duration::hours(i64::from(self.time_flexibility));
            let earliest = self.preferred_date_time - flexibility;
            let latest = self.preferred_date_time + flexibility;

            if proposed < earliest || proposed > latest {
                return Err(time_window_violation_error());
            }
        }

        Ok(())
    }

    #[tracing::instrument]
    pub fn close(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Open => {
                self.status = Status::Closed;
                Ok(())
            }
            Status::Closed => Err(request_not_open_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    fn params(now: DateTime<Utc>) -> NewRideRequest {
        NewRideRequest {
            origin_city_id: Uuid::new_v4(),
            destination_city_id: Uuid::new_v4(),
            preferred_date_time: now + Duration::days(2),
            time_flexibility: 2,
            seats_needed: 1,
            min_budget: Some(dec!(20)),
            max_budget: Some(dec!(40)),
            notes: None,
            expires_at: None,
        }
    }

    #[test]
    fn expiry_defaults_to_latest_acceptable_departure() {
        let now = Utc::now();
        let request = RideRequest::new(Uuid::new_v4(), params(now), now).unwrap();

        assert_eq!(
            request.expires_at,
            request.preferred_date_time + Duration::hours(2)
        );
        assert!(request.is_biddable(now));
        assert!(!request.is_biddable(request.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn rejects_inverted_budget() {
        let now = Utc::now();
        let mut params = params(now);
        params.min_budget = Some(dec!(50));

        let err = RideRequest::new(Uuid::new_v4(), params, now).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationFailed);
    }

    #[test]
    fn rejects_same_origin_and_destination() {
        let now = Utc::now();
        let mut params = params(now);
        params.destination_city_id = params.origin_city_id;

        assert!(RideRequest::new(Uuid::new_v4(), params, now).is_err());
    }

    #[test]
    fn offer_outside_budget_is_a_budget_violation() {
        let now = Utc::now();
        let request = RideRequest::new(Uuid::new_v4(), params(now), now).unwrap();

        assert_eq!(request.check_offer(dec!(15), None).unwrap_err().code, 160);
        assert_eq!(request.check_offer(dec!(41), None).unwrap_err().code, 160);
        assert!(request.check_offer(dec!(20), None).is_ok());
        assert!(request.check_offer(dec!(40), None).is_ok());
    }

    #[test]
    fn proposed_time_must_fall_in_flexibility_window() {
        let now = Utc::now();
        let request = RideRequest::new(Uuid::new_v4(), params(now), now).unwrap();
        let preferred = request.preferred_date_time;

        assert!(request
            .check_offer(dec!(30), Some(preferred - Duration::hours(2)))
            .is_ok());
        assert_eq!(
            request
                .check_offer(dec!(30), Some(preferred + Duration::hours(3)))
                .unwrap_err()
                .code,
            161
        );
    }

    #[test]
    fn close_is_one_way() {
        let now = Utc::now();
        let mut request = RideRequest::new(Uuid::new_v4(), params(now), now).unwrap();

        request.close().unwrap();
        assert_eq!(request.status, Status::Closed);
        assert_eq!(request.close().unwrap_err().kind, ErrorKind::InvalidState);
    }

    #[test]
    fn closed_request_is_not_biddable_even_before_expiry() {
        let now = Utc::now();
        let mut request = RideRequest::new(Uuid::new_v4(), params(now), now).unwrap();
        request.close().unwrap();

        assert_eq!(
            request.ensure_biddable(now).unwrap_err().kind,
            ErrorKind::InvalidState
        );
    }
}
