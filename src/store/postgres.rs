use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use sqlx::{
    postgres::{PgArguments, PgPoolOptions},
    query::Query,
    types::Json,
    Executor, Pool, Postgres, Row, Transaction,
};
use uuid::Uuid;

use super::{Lock, Store, Table, Tx};
use crate::entities::{
    Bid, Booking, CreditPackage, CreditTransaction, DriverCredit, Ride, RideRequest,
};
use crate::error::{duplicate_bid_error, duplicate_booking_error, Error};

type Database = Postgres;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS ride_requests (id UUID PRIMARY KEY, passenger_id UUID NOT NULL, status VARCHAR NOT NULL, preferred_date_time TIMESTAMPTZ NOT NULL, expires_at TIMESTAMPTZ NOT NULL, created_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL)",
    "CREATE INDEX IF NOT EXISTS ride_requests_status_expiry ON ride_requests (status, expires_at)",
    "CREATE TABLE IF NOT EXISTS bids (id UUID PRIMARY KEY, request_id UUID NOT NULL, driver_id UUID NOT NULL, status VARCHAR NOT NULL, expires_at TIMESTAMPTZ NOT NULL, created_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL, CONSTRAINT fk_bid_request FOREIGN KEY(request_id) REFERENCES ride_requests(id))",
    // one live bid per driver per request, enforced by the database
    "CREATE UNIQUE INDEX IF NOT EXISTS bids_one_active_per_driver ON bids (request_id, driver_id) WHERE status <> 'rejected'",
    "CREATE TABLE IF NOT EXISTS credit_packages (id UUID PRIMARY KEY, active BOOLEAN NOT NULL, price NUMERIC NOT NULL, data JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS driver_credits (id UUID PRIMARY KEY, driver_id UUID NOT NULL, payment_id VARCHAR UNIQUE, purchased_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL)",
    "CREATE INDEX IF NOT EXISTS driver_credits_fifo ON driver_credits (driver_id, purchased_at, id)",
    // no foreign key on credit_id: a rolled back lot leaves its history behind
    "CREATE TABLE IF NOT EXISTS credit_transactions (id UUID PRIMARY KEY, credit_id UUID NOT NULL, driver_id UUID NOT NULL, ride_id UUID, created_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS rides (id UUID PRIMARY KEY, driver_id UUID NOT NULL, status VARCHAR NOT NULL, departure_time TIMESTAMPTZ NOT NULL, data JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS bookings (id UUID PRIMARY KEY, ride_id UUID NOT NULL, passenger_id UUID NOT NULL, status VARCHAR NOT NULL, created_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL, CONSTRAINT fk_booking_ride FOREIGN KEY(ride_id) REFERENCES rides(id))",
    "CREATE UNIQUE INDEX IF NOT EXISTS bookings_one_active_per_passenger ON bookings (ride_id, passenger_id) WHERE status <> 'cancelled'",
];

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Pool<Database>,
}

impl PgStore {
    #[tracing::instrument(skip(db_uri))]
    pub async fn connect(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        for statement in SCHEMA {
            pool.execute(*statement).await?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Database> {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn with_transaction<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send,
        F: for<'tx> FnOnce(&'tx mut dyn Tx) -> BoxFuture<'tx, Result<T, Error>> + Send,
    {
        let mut tx = PgTx {
            tx: self.pool.begin().await?,
        };

        match f(&mut tx).await {
            Ok(value) => {
                tx.tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.tx.rollback().await {
                    tracing::warn!(%rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

pub struct PgTx {
    tx: Transaction<'static, Database>,
}

impl PgTx {
    async fn fetch_by_id<T: DeserializeOwned>(
        &mut self,
        table: Table,
        id: Uuid,
        lock: Lock,
    ) -> Result<Option<T>, Error> {
        let query = format!(
            "SELECT data FROM {} WHERE id = $1{}",
            table.name(),
            lock.clause()
        );

        let maybe_result = self
            .tx
            .fetch_optional(sqlx::query(&query).bind(id))
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(value): Json<T> = result.try_get("data")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn fetch_data<'q, T: DeserializeOwned>(
        &mut self,
        query: Query<'q, Database, PgArguments>,
    ) -> Result<Vec<T>, Error> {
        let results = self.tx.fetch_all(query).await?;

        let mut values = Vec::with_capacity(results.len());
        for result in results {
            let Json(value): Json<T> = result.try_get("data")?;
            values.push(value);
        }

        Ok(values)
    }
}

#[async_trait]
impl Tx for PgTx {
    #[tracing::instrument(skip(self))]
    async fn insert_request(&mut self, request: &RideRequest) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query("INSERT INTO ride_requests (id, passenger_id, status, preferred_date_time, expires_at, created_at, data) VALUES ($1, $2, $3, $4, $5, $6, $7)")
                    .bind(request.id)
                    .bind(request.passenger_id)
                    .bind(request.status.name())
                    .bind(request.preferred_date_time)
                    .bind(request.expires_at)
                    .bind(request.created_at)
                    .bind(Json(request)),
            )
            .await?;

        Ok(())
    }

    async fn find_request(&mut self, id: Uuid, lock: Lock) -> Result<Option<RideRequest>, Error> {
        self.fetch_by_id(Table::RideRequests, id, lock).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_request(&mut self, request: &RideRequest) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query("UPDATE ride_requests SET status = $2, data = $3 WHERE id = $1")
                    .bind(request.id)
                    .bind(request.status.name())
                    .bind(Json(request)),
            )
            .await?;

        Ok(())
    }

    async fn open_requests(&mut self) -> Result<Vec<RideRequest>, Error> {
        self.fetch_data(sqlx::query(
            "SELECT data FROM ride_requests WHERE status = 'open' ORDER BY preferred_date_time, id",
        ))
        .await
    }

    async fn requests_by_passenger(
        &mut self,
        passenger_id: Uuid,
    ) -> Result<Vec<RideRequest>, Error> {
        self.fetch_data(
            sqlx::query(
                "SELECT data FROM ride_requests WHERE passenger_id = $1 ORDER BY created_at DESC, id",
            )
            .bind(passenger_id),
        )
        .await
    }

    async fn expired_open_requests(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RideRequest>, Error> {
        self.fetch_data(
            sqlx::query(
                "SELECT data FROM ride_requests WHERE status = 'open' AND expires_at < $1 ORDER BY expires_at, id FOR UPDATE",
            )
            .bind(now),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn insert_bid(&mut self, bid: &Bid) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query("INSERT INTO bids (id, request_id, driver_id, status, expires_at, created_at, data) VALUES ($1, $2, $3, $4, $5, $6, $7)")
                    .bind(bid.id)
                    .bind(bid.request_id)
                    .bind(bid.driver_id)
                    .bind(bid.status.name())
                    .bind(bid.expires_at)
                    .bind(bid.created_at)
                    .bind(Json(bid)),
            )
            .await
            .map_err(|err| match Error::from(err) {
                err if err.is_conflict() => duplicate_bid_error(),
                err => err,
            })?;

        Ok(())
    }

    async fn find_bid(&mut self, id: Uuid, lock: Lock) -> Result<Option<Bid>, Error> {
        self.fetch_by_id(Table::Bids, id, lock).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_bid(&mut self, bid: &Bid) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query("UPDATE bids SET status = $2, data = $3 WHERE id = $1")
                    .bind(bid.id)
                    .bind(bid.status.name())
                    .bind(Json(bid)),
            )
            .await?;

        Ok(())
    }

    async fn bids_for_request(&mut self, request_id: Uuid, lock: Lock) -> Result<Vec<Bid>, Error> {
        let query = format!(
            "SELECT data FROM bids WHERE request_id = $1 ORDER BY created_at, id{}",
            lock.clause()
        );

        self.fetch_data(sqlx::query(&query).bind(request_id)).await
    }

    async fn bids_by_driver(&mut self, driver_id: Uuid) -> Result<Vec<Bid>, Error> {
        self.fetch_data(
            sqlx::query("SELECT data FROM bids WHERE driver_id = $1 ORDER BY created_at DESC, id")
                .bind(driver_id),
        )
        .await
    }

    async fn expired_pending_bids(&mut self, now: DateTime<Utc>) -> Result<Vec<Bid>, Error> {
        self.fetch_data(
            sqlx::query(
                "SELECT data FROM bids WHERE status = 'pending' AND expires_at < $1 ORDER BY expires_at, id FOR UPDATE",
            )
            .bind(now),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn insert_package(&mut self, package: &CreditPackage) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query(
                    "INSERT INTO credit_packages (id, active, price, data) VALUES ($1, $2, $3, $4)",
                )
                .bind(package.id)
                .bind(package.active)
                .bind(package.price)
                .bind(Json(package)),
            )
            .await?;

        Ok(())
    }

    async fn find_package(
        &mut self,
        id: Uuid,
        lock: Lock,
    ) -> Result<Option<CreditPackage>, Error> {
        self.fetch_by_id(Table::CreditPackages, id, lock).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_package(&mut self, package: &CreditPackage) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query(
                    "UPDATE credit_packages SET active = $2, price = $3, data = $4 WHERE id = $1",
                )
                .bind(package.id)
                .bind(package.active)
                .bind(package.price)
                .bind(Json(package)),
            )
            .await?;

        Ok(())
    }

    async fn active_packages(&mut self) -> Result<Vec<CreditPackage>, Error> {
        self.fetch_data(sqlx::query(
            "SELECT data FROM credit_packages WHERE active ORDER BY price, id",
        ))
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn insert_lot(&mut self, lot: &DriverCredit) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query("INSERT INTO driver_credits (id, driver_id, payment_id, purchased_at, data) VALUES ($1, $2, $3, $4, $5)")
                    .bind(lot.id)
                    .bind(lot.driver_id)
                    .bind(lot.payment_id.as_deref())
                    .bind(lot.purchased_at)
                    .bind(Json(lot)),
            )
            .await?;

        Ok(())
    }

    async fn find_lot(&mut self, id: Uuid, lock: Lock) -> Result<Option<DriverCredit>, Error> {
        self.fetch_by_id(Table::DriverCredits, id, lock).await
    }

    async fn find_lot_by_payment(
        &mut self,
        payment_id: &str,
        lock: Lock,
    ) -> Result<Option<DriverCredit>, Error> {
        let query = format!(
            "SELECT data FROM driver_credits WHERE payment_id = $1{}",
            lock.clause()
        );

        let mut lots = self.fetch_data(sqlx::query(&query).bind(payment_id)).await?;

        Ok(lots.pop())
    }

    async fn lots_for_driver(
        &mut self,
        driver_id: Uuid,
        lock: Lock,
    ) -> Result<Vec<DriverCredit>, Error> {
        let query = format!(
            "SELECT data FROM driver_credits WHERE driver_id = $1 ORDER BY purchased_at, id{}",
            lock.clause()
        );

        self.fetch_data(sqlx::query(&query).bind(driver_id)).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_lot(&mut self, lot: &DriverCredit) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query("UPDATE driver_credits SET data = $2 WHERE id = $1")
                    .bind(lot.id)
                    .bind(Json(lot)),
            )
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_lot(&mut self, id: Uuid) -> Result<bool, Error> {
        let result = self
            .tx
            .execute(sqlx::query("DELETE FROM driver_credits WHERE id = $1").bind(id))
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn insert_credit_transaction(
        &mut self,
        transaction: &CreditTransaction,
    ) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query("INSERT INTO credit_transactions (id, credit_id, driver_id, ride_id, created_at, data) VALUES ($1, $2, $3, $4, $5, $6)")
                    .bind(transaction.id)
                    .bind(transaction.credit_id)
                    .bind(transaction.driver_id)
                    .bind(transaction.ride_id)
                    .bind(transaction.created_at)
                    .bind(Json(transaction)),
            )
            .await?;

        Ok(())
    }

    async fn credit_transactions_for_driver(
        &mut self,
        driver_id: Uuid,
    ) -> Result<Vec<CreditTransaction>, Error> {
        self.fetch_data(
            sqlx::query(
                "SELECT data FROM credit_transactions WHERE driver_id = $1 ORDER BY created_at, id",
            )
            .bind(driver_id),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn insert_ride(&mut self, ride: &Ride) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query("INSERT INTO rides (id, driver_id, status, departure_time, data) VALUES ($1, $2, $3, $4, $5)")
                    .bind(ride.id)
                    .bind(ride.driver_id)
                    .bind(ride.status.name())
                    .bind(ride.departure_time)
                    .bind(Json(ride)),
            )
            .await?;

        Ok(())
    }

    async fn find_ride(&mut self, id: Uuid, lock: Lock) -> Result<Option<Ride>, Error> {
        self.fetch_by_id(Table::Rides, id, lock).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_ride(&mut self, ride: &Ride) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query("UPDATE rides SET status = $2, data = $3 WHERE id = $1")
                    .bind(ride.id)
                    .bind(ride.status.name())
                    .bind(Json(ride)),
            )
            .await?;

        Ok(())
    }

    async fn rides_by_driver(&mut self, driver_id: Uuid) -> Result<Vec<Ride>, Error> {
        self.fetch_data(
            sqlx::query("SELECT data FROM rides WHERE driver_id = $1 ORDER BY departure_time, id")
                .bind(driver_id),
        )
        .await
    }

    async fn active_rides(&mut self) -> Result<Vec<Ride>, Error> {
        self.fetch_data(sqlx::query(
            "SELECT data FROM rides WHERE status = 'active' ORDER BY departure_time, id",
        ))
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query("INSERT INTO bookings (id, ride_id, passenger_id, status, created_at, data) VALUES ($1, $2, $3, $4, $5, $6)")
                    .bind(booking.id)
                    .bind(booking.ride_id)
                    .bind(booking.passenger_id)
                    .bind(booking.status.name())
                    .bind(booking.created_at)
                    .bind(Json(booking)),
            )
            .await
            .map_err(|err| match Error::from(err) {
                err if err.is_conflict() => duplicate_booking_error(),
                err => err,
            })?;

        Ok(())
    }

    async fn find_booking(&mut self, id: Uuid, lock: Lock) -> Result<Option<Booking>, Error> {
        self.fetch_by_id(Table::Bookings, id, lock).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_booking(&mut self, booking: &Booking) -> Result<(), Error> {
        self.tx
            .execute(
                sqlx::query("UPDATE bookings SET status = $2, data = $3 WHERE id = $1")
                    .bind(booking.id)
                    .bind(booking.status.name())
                    .bind(Json(booking)),
            )
            .await?;

        Ok(())
    }

    async fn bookings_for_ride(
        &mut self,
        ride_id: Uuid,
        lock: Lock,
    ) -> Result<Vec<Booking>, Error> {
        let query = format!(
            "SELECT data FROM bookings WHERE ride_id = $1 ORDER BY created_at, id{}",
            lock.clause()
        );

        self.fetch_data(sqlx::query(&query).bind(ride_id)).await
    }

    async fn bookings_by_passenger(&mut self, passenger_id: Uuid) -> Result<Vec<Booking>, Error> {
        self.fetch_data(
            sqlx::query(
                "SELECT data FROM bookings WHERE passenger_id = $1 ORDER BY created_at DESC, id",
            )
            .bind(passenger_id),
        )
        .await
    }
}
