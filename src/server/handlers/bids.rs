use axum::extract::{Extension, Json, Path};
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::User;
use crate::entities::{Bid, BidOffer};
use crate::error::Error;

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(request_id): Path<Uuid>,
    Json(offer): Json<BidOffer>,
) -> Result<Json<Bid>, Error> {
    let bid = api.create_bid(user, request_id, offer).await?;

    Ok(bid.into())
}

pub async fn list_mine(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<Bid>>, Error> {
    let bids = api.driver_bids(user).await?;

    Ok(bids.into())
}

pub async fn update(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(offer): Json<BidOffer>,
) -> Result<Json<Bid>, Error> {
    let bid = api.update_bid(user, id, offer).await?;

    Ok(bid.into())
}

pub async fn withdraw(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Bid>, Error> {
    let bid = api.withdraw_bid(user, id).await?;

    Ok(bid.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Bid>, Error> {
    let bid = api.accept_bid(user, id).await?;

    Ok(bid.into())
}

pub async fn reject(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Bid>, Error> {
    let bid = api.reject_bid(user, id).await?;

    Ok(bid.into())
}
