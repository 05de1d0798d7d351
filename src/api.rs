use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{
    Bid, BidOffer, BidSort, Booking, BookingStatus, CreditAccount, CreditPackage,
    CreditTransaction, DriverCredit, NewRide, NewRideRequest, Ride, RideRequest,
};
use crate::error::Error;

#[async_trait]
pub trait CreditAPI {
    async fn create_package(
        &self,
        user: User,
        name: String,
        credits: u32,
        price: Decimal,
    ) -> Result<CreditPackage, Error>;
    async fn deactivate_package(&self, user: User, id: Uuid) -> Result<CreditPackage, Error>;
    async fn list_packages(&self, user: User) -> Result<Vec<CreditPackage>, Error>;
    async fn purchase_credits(
        &self,
        user: User,
        package_id: Uuid,
        payment_id: Option<String>,
    ) -> Result<DriverCredit, Error>;
    async fn credit_account(&self, user: User, driver_id: Uuid) -> Result<CreditAccount, Error>;
    async fn credit_transactions(
        &self,
        user: User,
        driver_id: Uuid,
    ) -> Result<Vec<CreditTransaction>, Error>;
    async fn refund_credits(
        &self,
        user: User,
        driver_id: Uuid,
        credits: u32,
        reason: String,
    ) -> Result<DriverCredit, Error>;
    async fn rollback_lot(&self, user: User, lot_id: Uuid) -> Result<(), Error>;
}

#[async_trait]
pub trait RideRequestAPI {
    async fn create_request(&self, user: User, params: NewRideRequest)
        -> Result<RideRequest, Error>;
    async fn find_request(&self, user: User, id: Uuid) -> Result<RideRequest, Error>;
    async fn open_requests(&self, user: User) -> Result<Vec<RideRequest>, Error>;
    async fn passenger_requests(&self, user: User) -> Result<Vec<RideRequest>, Error>;
    async fn cancel_request(&self, user: User, id: Uuid) -> Result<RideRequest, Error>;
    async fn request_bids(&self, user: User, id: Uuid, sort: BidSort) -> Result<Vec<Bid>, Error>;
}

#[async_trait]
pub trait BidAPI {
    async fn create_bid(&self, user: User, request_id: Uuid, offer: BidOffer)
        -> Result<Bid, Error>;
    async fn update_bid(&self, user: User, id: Uuid, offer: BidOffer) -> Result<Bid, Error>;
    async fn withdraw_bid(&self, user: User, id: Uuid) -> Result<Bid, Error>;
    async fn accept_bid(&self, user: User, id: Uuid) -> Result<Bid, Error>;
    async fn reject_bid(&self, user: User, id: Uuid) -> Result<Bid, Error>;
    async fn driver_bids(&self, user: User) -> Result<Vec<Bid>, Error>;
}

#[async_trait]
pub trait RideAPI {
    async fn post_ride(&self, user: User, params: NewRide) -> Result<Ride, Error>;
    async fn find_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;
    async fn active_rides(&self, user: User) -> Result<Vec<Ride>, Error>;
    async fn driver_rides(&self, user: User) -> Result<Vec<Ride>, Error>;
    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;
    async fn complete_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;
}

#[async_trait]
pub trait BookingAPI {
    async fn create_booking(&self, user: User, ride_id: Uuid, seats: u32)
        -> Result<Booking, Error>;
    async fn find_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;
    async fn passenger_bookings(&self, user: User) -> Result<Vec<Booking>, Error>;
    async fn ride_bookings(&self, user: User, ride_id: Uuid) -> Result<Vec<Booking>, Error>;
    async fn cancel_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;
    async fn update_booking_status(
        &self,
        user: User,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, Error>;
}

#[async_trait]
pub trait PaymentAPI {
    /// Returns the captured lot, or `None` when the failed payment's lot was removed.
    async fn confirm_payment(
        &self,
        user: User,
        payment_id: String,
        succeeded: bool,
    ) -> Result<Option<DriverCredit>, Error>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub closed_requests: usize,
    pub rejected_bids: usize,
}

#[async_trait]
pub trait MaintenanceAPI {
    async fn sweep_expired(&self, user: User) -> Result<SweepReport, Error>;
}

pub trait API:
    CreditAPI + RideRequestAPI + BidAPI + RideAPI + BookingAPI + PaymentAPI + MaintenanceAPI
{
}

pub type DynAPI = Arc<dyn API + Send + Sync>;
