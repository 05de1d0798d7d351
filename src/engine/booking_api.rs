use super::helpers::{fetch_booking, fetch_ride};
use super::Engine;

use async_trait::async_trait;
use oso::Oso;
use uuid::Uuid;

use crate::{
    api::BookingAPI,
    auth::{authorizor, Marketplace, User},
    entities::{booked_seats, Booking, BookingStatus, Ride},
    error::{
        duplicate_booking_error, forbidden_error, ride_not_active_error, seats_unavailable_error,
        Error,
    },
    store::{Lock, Store},
};

/// A booking is visible to, and cancellable by, its passenger and the ride's driver.
fn authorize_booking(
    authorizor: &Oso,
    user: User,
    action: &'static str,
    booking: &Booking,
    ride: &Ride,
) -> Result<(), Error> {
    if authorizor.is_allowed(user.clone(), action, booking.clone())?
        || authorizor.is_allowed(user, "manage", ride.clone())?
    {
        return Ok(());
    }

    Err(forbidden_error())
}

#[async_trait]
impl<S: Store> BookingAPI for Engine<S> {
    #[tracing::instrument(skip(self))]
    async fn create_booking(
        &self,
        user: User,
        ride_id: Uuid,
        seats: u32,
    ) -> Result<Booking, Error> {
        self.authorize_creation(user.clone(), "create_booking")?;

        let passenger_id = user.id;
        let now = self.now();

        let booking = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    // the seat check and the decrement happen under this lock
                    let mut ride = fetch_ride(tx, ride_id, Lock::ForUpdate).await?;
                    if !ride.is_active() {
                        return Err(ride_not_active_error());
                    }

                    let booking = Booking::new(&ride, passenger_id, seats, now)?;

                    let bookings = tx.bookings_for_ride(ride_id, Lock::None).await?;
                    if bookings
                        .iter()
                        .any(|other| other.passenger_id == passenger_id && other.is_active())
                    {
                        return Err(duplicate_booking_error());
                    }

                    let remaining = ride.total_seats.saturating_sub(booked_seats(&bookings));
                    if seats > remaining {
                        return Err(seats_unavailable_error());
                    }

                    ride.reserve_seats(seats)?;

                    tx.insert_booking(&booking).await?;
                    tx.update_ride(&ride).await?;

                    Ok(booking)
                })
            })
            .await?;

        tracing::info!(booking_id = %booking.id, ride_id = %booking.ride_id, "ride booked");

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn find_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        let (booking, ride) = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let booking = fetch_booking(tx, id, Lock::None).await?;
                    let ride = fetch_ride(tx, booking.ride_id, Lock::None).await?;

                    Ok((booking, ride))
                })
            })
            .await?;

        authorize_booking(&self.authorizor, user, "read", &booking, &ride)?;

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn passenger_bookings(&self, user: User) -> Result<Vec<Booking>, Error> {
        self.authorize(user.clone(), "browse", Marketplace)?;

        let passenger_id = user.id;
        self.store
            .with_transaction(move |tx| {
                Box::pin(async move { tx.bookings_by_passenger(passenger_id).await })
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn ride_bookings(&self, user: User, ride_id: Uuid) -> Result<Vec<Booking>, Error> {
        let authorizor = self.authorizor.clone();

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let ride = fetch_ride(tx, ride_id, Lock::None).await?;
                    authorizor::authorize(&authorizor, user, "list_bookings", ride)?;

                    tx.bookings_for_ride(ride_id, Lock::None).await
                })
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        let authorizor = self.authorizor.clone();
        let now = self.now();

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let ride_id = fetch_booking(tx, id, Lock::None).await?.ride_id;

                    // ride first, then the booking
                    let mut ride = fetch_ride(tx, ride_id, Lock::ForUpdate).await?;
                    let mut booking = fetch_booking(tx, id, Lock::ForUpdate).await?;
                    authorize_booking(&authorizor, user, "cancel", &booking, &ride)?;

                    let released = booking.cancel(now)?;
                    ride.release_seats(released)?;

                    tx.update_booking(&booking).await?;
                    tx.update_ride(&ride).await?;

                    Ok(booking)
                })
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn update_booking_status(
        &self,
        user: User,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, Error> {
        let authorizor = self.authorizor.clone();
        let now = self.now();

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let ride_id = fetch_booking(tx, id, Lock::None).await?.ride_id;

                    let mut ride = fetch_ride(tx, ride_id, Lock::ForUpdate).await?;
                    authorizor::authorize(&authorizor, user, "manage", ride.clone())?;

                    let mut booking = fetch_booking(tx, id, Lock::ForUpdate).await?;
                    let released = booking.transition(status, now)?;

                    if released > 0 {
                        ride.release_seats(released)?;
                        tx.update_ride(&ride).await?;
                    }

                    tx.update_booking(&booking).await?;

                    Ok(booking)
                })
            })
            .await
    }
}
