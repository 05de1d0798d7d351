use axum::extract::{Extension, Json, Path, Query};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::User;
use crate::entities::{Bid, BidSort, NewRideRequest, RideRequest};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct BidsQuery {
    #[serde(default)]
    sort: BidSort,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<NewRideRequest>,
) -> Result<Json<RideRequest>, Error> {
    let request = api.create_request(user, params).await?;

    Ok(request.into())
}

pub async fn list_open(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<RideRequest>>, Error> {
    let requests = api.open_requests(user).await?;

    Ok(requests.into())
}

pub async fn list_mine(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<RideRequest>>, Error> {
    let requests = api.passenger_requests(user).await?;

    Ok(requests.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<RideRequest>, Error> {
    let request = api.find_request(user, id).await?;

    Ok(request.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<RideRequest>, Error> {
    let request = api.cancel_request(user, id).await?;

    Ok(request.into())
}

pub async fn list_bids(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Query(query): Query<BidsQuery>,
) -> Result<Json<Vec<Bid>>, Error> {
    let bids = api.request_bids(user, id, query.sort).await?;

    Ok(bids.into())
}
