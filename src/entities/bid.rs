use chrono::{DateTime, Duration, Utc};
use oso::PolarClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::RideRequest;
use crate::error::{bid_expired_error, bid_not_pending_error, self_bid_forbidden_error, Error};

pub const BID_TTL_HOURS: i64 = 24;

#[derive(Clone, Debug, Serialize, Deserialize, PolarClass)]
pub struct Bid {
    #[polar(attribute)]
    pub id: Uuid,
    #[polar(attribute)]
    pub request_id: Uuid,
    #[polar(attribute)]
    pub driver_id: Uuid,
    pub price_offer: Decimal,
    pub proposed_date_time: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub status: Status,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Accepted,
    Rejected,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// The mutable part of a bid, used both to create and to revise one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BidOffer {
    pub price_offer: Decimal,
    pub proposed_date_time: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

/// Orderings offered when a passenger lists the bids on a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    #[default]
    Price,
    Status,
}

pub fn sort_bids(bids: &mut [Bid], sort: Sort) {
    match sort {
        Sort::Price => bids.sort_by(|a, b| {
            a.price_offer
                .cmp(&b.price_offer)
                .then_with(|| a.created_at.cmp(&b.created_at))
        }),
        Sort::Status => bids.sort_by(|a, b| {
            a.status
                .cmp(&b.status)
                .then_with(|| a.price_offer.cmp(&b.price_offer))
        }),
    }
}

impl Bid {
    /// Validates the offer against `request` and opens a bid that lapses after a day.
    pub fn new(
        request: &RideRequest,
        driver_id: Uuid,
        offer: BidOffer,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        request.ensure_biddable(now)?;

        if request.passenger_id == driver_id {
            return Err(self_bid_forbidden_error());
        }

        request.check_offer(offer.price_offer, offer.proposed_date_time)?;

        Ok(Self {
            id: Uuid::new_v4(),
            request_id: request.id,
            driver_id,
            price_offer: offer.price_offer,
            proposed_date_time: offer.proposed_date_time,
            message: offer.message,
            status: Status::Pending,
            expires_at: now + Duration::hours(BID_TTL_HOURS),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    /// Anything but rejected counts toward the one-bid-per-driver rule.
    pub fn is_active(&self) -> bool {
        self.status != Status::Rejected
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Status as seen by readers: a pending bid past its deadline reads as rejected.
    pub fn effective_status(&self, now: DateTime<Utc>) -> Status {
        match self.status {
            Status::Pending if self.is_expired(now) => Status::Rejected,
            status => status,
        }
    }

    /// Returns the bid as listings present it.
    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now);
        self
    }

    fn ensure_live(&self, now: DateTime<Utc>) -> Result<(), Error> {
        if !self.is_pending() {
            return Err(bid_not_pending_error());
        }

        if self.is_expired(now) {
            return Err(bid_expired_error());
        }

        Ok(())
    }

    #[tracing::instrument]
    pub fn revise(
        &mut self,
        request: &RideRequest,
        offer: BidOffer,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.ensure_live(now)?;
        request.ensure_biddable(now)?;
        request.check_offer(offer.price_offer, offer.proposed_date_time)?;

        self.price_offer = offer.price_offer;
        self.proposed_date_time = offer.proposed_date_time;
        self.message = offer.message;
        self.updated_at = now;

        Ok(())
    }

    #[tracing::instrument]
    pub fn accept(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        self.ensure_live(now)?;

        self.status = Status::Accepted;
        self.updated_at = now;

        Ok(())
    }

    /// Rejection by the passenger, withdrawal by the driver and loss to a sibling all land here.
    #[tracing::instrument]
    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        if !self.is_pending() {
            return Err(bid_not_pending_error());
        }

        self.status = Status::Rejected;
        self.updated_at = now;

        Ok(())
    }
}
