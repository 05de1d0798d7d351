use super::helpers::{charge_ride_post, fetch_ride};
use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::RideAPI,
    auth::{authorizor, Marketplace, User},
    entities::{credit, BookingStatus, NewRide, Ride},
    error::{insufficient_credits_error, schedule_conflict_error, Error},
    store::{Lock, Store},
};

#[async_trait]
impl<S: Store> RideAPI for Engine<S> {
    #[tracing::instrument(skip(self))]
    async fn post_ride(&self, user: User, params: NewRide) -> Result<Ride, Error> {
        self.authorize_creation(user.clone(), "post_ride")?;

        let now = self.now();
        let ride = Ride::new(user.id, params, now)?;
        self.moderate(ride.description.as_deref()).await?;

        let posted = ride.clone();
        let deduction = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let ride = posted;

                    // locking the lots serializes every post by this driver
                    let mut lots = tx.lots_for_driver(ride.driver_id, Lock::ForUpdate).await?;
                    if !credit::can_post(&lots) {
                        return Err(insufficient_credits_error());
                    }

                    let scheduled = tx.rides_by_driver(ride.driver_id).await?;
                    if scheduled
                        .iter()
                        .any(|other| other.conflicts_with(ride.departure_time))
                    {
                        return Err(schedule_conflict_error());
                    }

                    tx.insert_ride(&ride).await?;

                    charge_ride_post(tx, &mut lots, ride.driver_id, ride.id, now).await
                })
            })
            .await?;

        tracing::info!(
            ride_id = %ride.id,
            lot_id = %deduction.consumed_lot_id,
            "ride posted"
        );

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let ride = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move { fetch_ride(tx, id, Lock::None).await })
            })
            .await?;

        self.authorize(user, "read", ride.clone())?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn active_rides(&self, user: User) -> Result<Vec<Ride>, Error> {
        self.authorize(user, "browse", Marketplace)?;

        self.store
            .with_transaction(|tx| Box::pin(async move { tx.active_rides().await }))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn driver_rides(&self, user: User) -> Result<Vec<Ride>, Error> {
        self.authorize(user.clone(), "browse", Marketplace)?;

        let driver_id = user.id;
        self.store
            .with_transaction(move |tx| {
                Box::pin(async move { tx.rides_by_driver(driver_id).await })
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let authorizor = self.authorizor.clone();
        let now = self.now();

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let mut ride = fetch_ride(tx, id, Lock::ForUpdate).await?;
                    authorizor::authorize(&authorizor, user, "manage", ride.clone())?;

                    ride.cancel()?;

                    let bookings = tx.bookings_for_ride(id, Lock::ForUpdate).await?;
                    for mut booking in bookings {
                        if !matches!(
                            booking.status,
                            BookingStatus::Pending | BookingStatus::Confirmed
                        ) {
                            continue;
                        }

                        let released = booking.cancel(now)?;
                        ride.release_seats(released)?;
                        tx.update_booking(&booking).await?;
                    }

                    tx.update_ride(&ride).await?;

                    Ok(ride)
                })
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn complete_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let authorizor = self.authorizor.clone();
        let now = self.now();

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let mut ride = fetch_ride(tx, id, Lock::ForUpdate).await?;
                    authorizor::authorize(&authorizor, user, "manage", ride.clone())?;

                    ride.complete()?;

                    let bookings = tx.bookings_for_ride(id, Lock::ForUpdate).await?;
                    for mut booking in bookings {
                        if booking.status != BookingStatus::Confirmed {
                            continue;
                        }

                        booking.transition(BookingStatus::Completed, now)?;
                        tx.update_booking(&booking).await?;
                    }

                    tx.update_ride(&ride).await?;

                    Ok(ride)
                })
            })
            .await
    }
}
