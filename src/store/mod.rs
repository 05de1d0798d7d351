//! Transactional data access.
//!
//! Engine operations never talk to a database directly. They hand a closure to
//! [`Store::with_transaction`], which runs it against a [`Tx`] and commits only if the
//! closure returns `Ok`. Any error rolls every write in the closure back.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::entities::{
    Bid, Booking, CreditPackage, CreditTransaction, DriverCredit, Ride, RideRequest,
};
use crate::error::Error;

pub use memory::MemStore;
pub use postgres::PgStore;

/// Row locking for reads that precede a write in the same transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lock {
    None,
    ForUpdate,
}

impl Lock {
    fn clause(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::ForUpdate => " FOR UPDATE",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    RideRequests,
    Bids,
    CreditPackages,
    DriverCredits,
    CreditTransactions,
    Rides,
    Bookings,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RideRequests => "ride_requests",
            Self::Bids => "bids",
            Self::CreditPackages => "credit_packages",
            Self::DriverCredits => "driver_credits",
            Self::CreditTransactions => "credit_transactions",
            Self::Rides => "rides",
            Self::Bookings => "bookings",
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn with_transaction<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send,
        F: for<'tx> FnOnce(&'tx mut dyn Tx) -> BoxFuture<'tx, Result<T, Error>> + Send;
}

/// Everything the engine can read or write inside one transaction.
#[async_trait]
pub trait Tx: Send {
    // ride requests
    async fn insert_request(&mut self, request: &RideRequest) -> Result<(), Error>;
    async fn find_request(&mut self, id: Uuid, lock: Lock) -> Result<Option<RideRequest>, Error>;
    async fn update_request(&mut self, request: &RideRequest) -> Result<(), Error>;
    async fn open_requests(&mut self) -> Result<Vec<RideRequest>, Error>;
    async fn requests_by_passenger(&mut self, passenger_id: Uuid)
        -> Result<Vec<RideRequest>, Error>;
    async fn expired_open_requests(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RideRequest>, Error>;

    // bids
    async fn insert_bid(&mut self, bid: &Bid) -> Result<(), Error>;
    async fn find_bid(&mut self, id: Uuid, lock: Lock) -> Result<Option<Bid>, Error>;
    async fn update_bid(&mut self, bid: &Bid) -> Result<(), Error>;
    async fn bids_for_request(&mut self, request_id: Uuid, lock: Lock) -> Result<Vec<Bid>, Error>;
    async fn bids_by_driver(&mut self, driver_id: Uuid) -> Result<Vec<Bid>, Error>;
    async fn expired_pending_bids(&mut self, now: DateTime<Utc>) -> Result<Vec<Bid>, Error>;

    // credit packages
    async fn insert_package(&mut self, package: &CreditPackage) -> Result<(), Error>;
    async fn find_package(&mut self, id: Uuid, lock: Lock)
        -> Result<Option<CreditPackage>, Error>;
    async fn update_package(&mut self, package: &CreditPackage) -> Result<(), Error>;
    async fn active_packages(&mut self) -> Result<Vec<CreditPackage>, Error>;

    // credit lots, oldest first
    async fn insert_lot(&mut self, lot: &DriverCredit) -> Result<(), Error>;
    async fn find_lot(&mut self, id: Uuid, lock: Lock) -> Result<Option<DriverCredit>, Error>;
    async fn find_lot_by_payment(
        &mut self,
        payment_id: &str,
        lock: Lock,
    ) -> Result<Option<DriverCredit>, Error>;
    async fn lots_for_driver(
        &mut self,
        driver_id: Uuid,
        lock: Lock,
    ) -> Result<Vec<DriverCredit>, Error>;
    async fn update_lot(&mut self, lot: &DriverCredit) -> Result<(), Error>;
    async fn delete_lot(&mut self, id: Uuid) -> Result<bool, Error>;

    // credit transactions, append only
    async fn insert_credit_transaction(
        &mut self,
        transaction: &CreditTransaction,
    ) -> Result<(), Error>;
    async fn credit_transactions_for_driver(
        &mut self,
        driver_id: Uuid,
    ) -> Result<Vec<CreditTransaction>, Error>;

    // rides
    async fn insert_ride(&mut self, ride: &Ride) -> Result<(), Error>;
    async fn find_ride(&mut self, id: Uuid, lock: Lock) -> Result<Option<Ride>, Error>;
    async fn update_ride(&mut self, ride: &Ride) -> Result<(), Error>;
    async fn rides_by_driver(&mut self, driver_id: Uuid) -> Result<Vec<Ride>, Error>;
    async fn active_rides(&mut self) -> Result<Vec<Ride>, Error>;

    // bookings
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), Error>;
    async fn find_booking(&mut self, id: Uuid, lock: Lock) -> Result<Option<Booking>, Error>;
    async fn update_booking(&mut self, booking: &Booking) -> Result<(), Error>;
    async fn bookings_for_ride(&mut self, ride_id: Uuid, lock: Lock)
        -> Result<Vec<Booking>, Error>;
    async fn bookings_by_passenger(&mut self, passenger_id: Uuid) -> Result<Vec<Booking>, Error>;
}
