use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::User;
use crate::entities::{Booking, BookingStatus};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct StatusParams {
    status: BookingStatus,
}

pub async fn list_mine(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<Booking>>, Error> {
    let bookings = api.passenger_bookings(user).await?;

    Ok(bookings.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.find_booking(user, id).await?;

    Ok(booking.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.cancel_booking(user, id).await?;

    Ok(booking.into())
}

pub async fn update_status(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<StatusParams>,
) -> Result<Json<Booking>, Error> {
    let booking = api.update_booking_status(user, id, params.status).await?;

    Ok(booking.into())
}
