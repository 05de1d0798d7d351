use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Lock, Store, Table, Tx};
use crate::entities::{
    Bid, Booking, CreditPackage, CreditTransaction, DriverCredit, Ride, RideRequest,
};
use crate::error::{
    conflict_error, database_error, duplicate_bid_error, duplicate_booking_error, Error,
};

#[derive(Clone, Debug, Default)]
struct State {
    requests: HashMap<Uuid, RideRequest>,
    bids: HashMap<Uuid, Bid>,
    packages: HashMap<Uuid, CreditPackage>,
    lots: HashMap<Uuid, DriverCredit>,
    credit_transactions: Vec<CreditTransaction>,
    rides: HashMap<Uuid, Ride>,
    bookings: HashMap<Uuid, Booking>,
}

/// In-process store.
///
/// Transactions run one at a time against a private copy of the state, which
/// replaces the shared state only when the transaction succeeds.
#[derive(Debug, Default)]
pub struct MemStore {
    state: Mutex<State>,
    faults: Mutex<HashSet<Table>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later write to `table` fail with a database error.
    pub async fn fail_writes_to(&self, table: Table) {
        self.faults.lock().await.insert(table);
    }

    pub async fn clear_faults(&self) {
        self.faults.lock().await.clear();
    }
}

#[async_trait]
impl Store for MemStore {
    async fn with_transaction<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send,
        F: for<'tx> FnOnce(&'tx mut dyn Tx) -> BoxFuture<'tx, Result<T, Error>> + Send,
    {
        let mut state = self.state.lock().await;
        let faults = self.faults.lock().await.clone();

        let mut tx = MemTx {
            state: state.clone(),
            faults,
        };

        let value = f(&mut tx).await?;
        *state = tx.state;

        Ok(value)
    }
}

pub struct MemTx {
    state: State,
    faults: HashSet<Table>,
}

impl MemTx {
    fn check_write(&self, table: Table) -> Result<(), Error> {
        if self.faults.contains(&table) {
            return Err(database_error(format!(
                "write to {} failed",
                table.name()
            )));
        }

        Ok(())
    }
}

fn replace<T: Clone>(rows: &mut HashMap<Uuid, T>, id: Uuid, row: &T) {
    if let Some(slot) = rows.get_mut(&id) {
        *slot = row.clone();
    }
}

fn fifo(lots: &mut [DriverCredit]) {
    lots.sort_by(|a, b| {
        a.purchased_at
            .cmp(&b.purchased_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[async_trait]
impl Tx for MemTx {
    async fn insert_request(&mut self, request: &RideRequest) -> Result<(), Error> {
        self.check_write(Table::RideRequests)?;

        if self.state.requests.contains_key(&request.id) {
            return Err(conflict_error());
        }

        self.state.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn find_request(&mut self, id: Uuid, _lock: Lock) -> Result<Option<RideRequest>, Error> {
        Ok(self.state.requests.get(&id).cloned())
    }

    async fn update_request(&mut self, request: &RideRequest) -> Result<(), Error> {
        self.check_write(Table::RideRequests)?;
        replace(&mut self.state.requests, request.id, request);
        Ok(())
    }

    async fn open_requests(&mut self) -> Result<Vec<RideRequest>, Error> {
        let mut requests: Vec<RideRequest> = self
            .state
            .requests
            .values()
            .filter(|request| request.is_open())
            .cloned()
            .collect();

        requests.sort_by(|a, b| {
            a.preferred_date_time
                .cmp(&b.preferred_date_time)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(requests)
    }

    async fn requests_by_passenger(
        &mut self,
        passenger_id: Uuid,
    ) -> Result<Vec<RideRequest>, Error> {
        let mut requests: Vec<RideRequest> = self
            .state
            .requests
            .values()
            .filter(|request| request.passenger_id == passenger_id)
            .cloned()
            .collect();

        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(requests)
    }

    async fn expired_open_requests(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RideRequest>, Error> {
        let mut requests: Vec<RideRequest> = self
            .state
            .requests
            .values()
            .filter(|request| request.is_open() && request.expires_at < now)
            .cloned()
            .collect();

        requests.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then_with(|| a.id.cmp(&b.id)));

        Ok(requests)
    }

    async fn insert_bid(&mut self, bid: &Bid) -> Result<(), Error> {
        self.check_write(Table::Bids)?;

        let duplicate = self.state.bids.values().any(|existing| {
            existing.request_id == bid.request_id
                && existing.driver_id == bid.driver_id
                && existing.is_active()
        });

        if duplicate {
            return Err(duplicate_bid_error());
        }

        self.state.bids.insert(bid.id, bid.clone());
        Ok(())
    }

    async fn find_bid(&mut self, id: Uuid, _lock: Lock) -> Result<Option<Bid>, Error> {
        Ok(self.state.bids.get(&id).cloned())
    }

    async fn update_bid(&mut self, bid: &Bid) -> Result<(), Error> {
        self.check_write(Table::Bids)?;
        replace(&mut self.state.bids, bid.id, bid);
        Ok(())
    }

    async fn bids_for_request(&mut self, request_id: Uuid, _lock: Lock) -> Result<Vec<Bid>, Error> {
        let mut bids: Vec<Bid> = self
            .state
            .bids
            .values()
            .filter(|bid| bid.request_id == request_id)
            .cloned()
            .collect();

        bids.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(bids)
    }

    async fn bids_by_driver(&mut self, driver_id: Uuid) -> Result<Vec<Bid>, Error> {
        let mut bids: Vec<Bid> = self
            .state
            .bids
            .values()
            .filter(|bid| bid.driver_id == driver_id)
            .cloned()
            .collect();

        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(bids)
    }

    async fn expired_pending_bids(&mut self, now: DateTime<Utc>) -> Result<Vec<Bid>, Error> {
        let mut bids: Vec<Bid> = self
            .state
            .bids
            .values()
            .filter(|bid| bid.is_pending() && bid.expires_at < now)
            .cloned()
            .collect();

        bids.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then_with(|| a.id.cmp(&b.id)));

        Ok(bids)
    }

    async fn insert_package(&mut self, package: &CreditPackage) -> Result<(), Error> {
        self.check_write(Table::CreditPackages)?;
        self.state.packages.insert(package.id, package.clone());
        Ok(())
    }

    async fn find_package(
        &mut self,
        id: Uuid,
        _lock: Lock,
    ) -> Result<Option<CreditPackage>, Error> {
        Ok(self.state.packages.get(&id).cloned())
    }

    async fn update_package(&mut self, package: &CreditPackage) -> Result<(), Error> {
        self.check_write(Table::CreditPackages)?;
        replace(&mut self.state.packages, package.id, package);
        Ok(())
    }

    async fn active_packages(&mut self) -> Result<Vec<CreditPackage>, Error> {
        let mut packages: Vec<CreditPackage> = self
            .state
            .packages
            .values()
            .filter(|package| package.active)
            .cloned()
            .collect();

        packages.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.id.cmp(&b.id)));

        Ok(packages)
    }

    async fn insert_lot(&mut self, lot: &DriverCredit) -> Result<(), Error> {
        self.check_write(Table::DriverCredits)?;

        if let Some(payment_id) = &lot.payment_id {
            let taken = self
                .state
                .lots
                .values()
                .any(|existing| existing.payment_id.as_ref() == Some(payment_id));

            if taken {
                return Err(conflict_error());
            }
        }

        self.state.lots.insert(lot.id, lot.clone());
        Ok(())
    }

    async fn find_lot(&mut self, id: Uuid, _lock: Lock) -> Result<Option<DriverCredit>, Error> {
        Ok(self.state.lots.get(&id).cloned())
    }

    async fn find_lot_by_payment(
        &mut self,
        payment_id: &str,
        _lock: Lock,
    ) -> Result<Option<DriverCredit>, Error> {
        Ok(self
            .state
            .lots
            .values()
            .find(|lot| lot.payment_id.as_deref() == Some(payment_id))
            .cloned())
    }

    async fn lots_for_driver(
        &mut self,
        driver_id: Uuid,
        _lock: Lock,
    ) -> Result<Vec<DriverCredit>, Error> {
        let mut lots: Vec<DriverCredit> = self
            .state
            .lots
            .values()
            .filter(|lot| lot.driver_id == driver_id)
            .cloned()
            .collect();

        fifo(&mut lots);

        Ok(lots)
    }

    async fn update_lot(&mut self, lot: &DriverCredit) -> Result<(), Error> {
        self.check_write(Table::DriverCredits)?;
        replace(&mut self.state.lots, lot.id, lot);
        Ok(())
    }

    async fn delete_lot(&mut self, id: Uuid) -> Result<bool, Error> {
        self.check_write(Table::DriverCredits)?;
        Ok(self.state.lots.remove(&id).is_some())
    }

    async fn insert_credit_transaction(
        &mut self,
        transaction: &CreditTransaction,
    ) -> Result<(), Error> {
        self.check_write(Table::CreditTransactions)?;
        self.state.credit_transactions.push(transaction.clone());
        Ok(())
    }

    async fn credit_transactions_for_driver(
        &mut self,
        driver_id: Uuid,
    ) -> Result<Vec<CreditTransaction>, Error> {
        Ok(self
            .state
            .credit_transactions
            .iter()
            .filter(|transaction| transaction.driver_id == driver_id)
            .cloned()
            .collect())
    }

    async fn insert_ride(&mut self, ride: &Ride) -> Result<(), Error> {
        self.check_write(Table::Rides)?;

        if self.state.rides.contains_key(&ride.id) {
            return Err(conflict_error());
        }

        self.state.rides.insert(ride.id, ride.clone());
        Ok(())
    }

    async fn find_ride(&mut self, id: Uuid, _lock: Lock) -> Result<Option<Ride>, Error> {
        Ok(self.state.rides.get(&id).cloned())
    }

    async fn update_ride(&mut self, ride: &Ride) -> Result<(), Error> {
        self.check_write(Table::Rides)?;
        replace(&mut self.state.rides, ride.id, ride);
        Ok(())
    }

    async fn rides_by_driver(&mut self, driver_id: Uuid) -> Result<Vec<Ride>, Error> {
        let mut rides: Vec<Ride> = self
            .state
            .rides
            .values()
            .filter(|ride| ride.driver_id == driver_id)
            .cloned()
            .collect();

        rides.sort_by(|a, b| {
            a.departure_time
                .cmp(&b.departure_time)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(rides)
    }

    async fn active_rides(&mut self) -> Result<Vec<Ride>, Error> {
        let mut rides: Vec<Ride> = self
            .state
            .rides
            .values()
            .filter(|ride| ride.is_active())
            .cloned()
            .collect();

        rides.sort_by(|a, b| {
            a.departure_time
                .cmp(&b.departure_time)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(rides)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), Error> {
        self.check_write(Table::Bookings)?;

        let duplicate = self.state.bookings.values().any(|existing| {
            existing.ride_id == booking.ride_id
                && existing.passenger_id == booking.passenger_id
                && existing.is_active()
        });

        if duplicate {
            return Err(duplicate_booking_error());
        }

        self.state.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_booking(&mut self, id: Uuid, _lock: Lock) -> Result<Option<Booking>, Error> {
        Ok(self.state.bookings.get(&id).cloned())
    }

    async fn update_booking(&mut self, booking: &Booking) -> Result<(), Error> {
        self.check_write(Table::Bookings)?;
        replace(&mut self.state.bookings, booking.id, booking);
        Ok(())
    }

    async fn bookings_for_ride(
        &mut self,
        ride_id: Uuid,
        _lock: Lock,
    ) -> Result<Vec<Booking>, Error> {
        let mut bookings: Vec<Booking> = self
            .state
            .bookings
            .values()
            .filter(|booking| booking.ride_id == ride_id)
            .cloned()
            .collect();

        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(bookings)
    }

    async fn bookings_by_passenger(&mut self, passenger_id: Uuid) -> Result<Vec<Booking>, Error> {
        let mut bookings: Vec<Booking> = self
            .state
            .bookings
            .values()
            .filter(|booking| booking.passenger_id == passenger_id)
            .cloned()
            .collect();

        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(bookings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::NewRide;
    use crate::error::ErrorKind;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn ride(driver_id: Uuid) -> Ride {
        let now = Utc::now();
        Ride::new(
            driver_id,
            NewRide {
                origin_city_id: Uuid::new_v4(),
                destination_city_id: Uuid::new_v4(),
                departure_time: now + Duration::hours(6),
                total_seats: 3,
                price_per_seat: dec!(12),
                description: None,
            },
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn failed_transaction_leaves_no_trace() {
        let store = MemStore::new();
        let driver_id = Uuid::new_v4();
        let ride = ride(driver_id);

        let result: Result<(), Error> = store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    tx.insert_ride(&ride).await?;
                    Err(conflict_error())
                })
            })
            .await;
        assert!(result.is_err());

        let rides = store
            .with_transaction(move |tx| {
                Box::pin(async move { tx.rides_by_driver(driver_id).await })
            })
            .await
            .unwrap();
        assert!(rides.is_empty());
    }

    #[tokio::test]
    async fn injected_fault_fails_the_write() {
        let store = MemStore::new();
        store.fail_writes_to(Table::Rides).await;
        let ride = ride(Uuid::new_v4());

        let err = store
            .with_transaction(move |tx| Box::pin(async move { tx.insert_ride(&ride).await }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }
}
