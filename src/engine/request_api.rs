use super::helpers::{fetch_request, reject_pending_bids};
use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::RideRequestAPI,
    auth::{authorizor, Marketplace, User},
    entities::{sort_bids, Bid, BidSort, NewRideRequest, RideRequest},
    error::Error,
    store::{Lock, Store},
};

#[async_trait]
impl<S: Store> RideRequestAPI for Engine<S> {
    #[tracing::instrument(skip(self))]
    async fn create_request(
        &self,
        user: User,
        params: NewRideRequest,
    ) -> Result<RideRequest, Error> {
        self.authorize_creation(user.clone(), "create_request")?;

        let request = RideRequest::new(user.id, params, self.now())?;
        self.moderate(request.notes.as_deref()).await?;

        let created = request.clone();
        self.store
            .with_transaction(move |tx| Box::pin(async move { tx.insert_request(&created).await }))
            .await?;

        tracing::info!(request_id = %request.id, "ride request opened");

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn find_request(&self, user: User, id: Uuid) -> Result<RideRequest, Error> {
        let request = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move { fetch_request(tx, id, Lock::None).await })
            })
            .await?;

        self.authorize(user, "read", request.clone())?;

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn open_requests(&self, user: User) -> Result<Vec<RideRequest>, Error> {
        self.authorize(user, "browse", Marketplace)?;

        let now = self.now();
        let requests = self
            .store
            .with_transaction(|tx| Box::pin(async move { tx.open_requests().await }))
            .await?;

        Ok(requests
            .into_iter()
            .filter(|request| request.is_biddable(now))
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn passenger_requests(&self, user: User) -> Result<Vec<RideRequest>, Error> {
        self.authorize(user.clone(), "browse", Marketplace)?;

        let passenger_id = user.id;
        self.store
            .with_transaction(move |tx| {
                Box::pin(async move { tx.requests_by_passenger(passenger_id).await })
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_request(&self, user: User, id: Uuid) -> Result<RideRequest, Error> {
        let authorizor = self.authorizor.clone();
        let now = self.now();

        let (request, rejected) = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let mut request = fetch_request(tx, id, Lock::ForUpdate).await?;
                    authorizor::authorize(&authorizor, user, "cancel", request.clone())?;

                    request.close()?;
                    tx.update_request(&request).await?;

                    let rejected = reject_pending_bids(tx, request.id, None, now).await?;

                    Ok((request, rejected))
                })
            })
            .await?;

        tracing::info!(request_id = %request.id, rejected, "ride request cancelled");

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn request_bids(&self, user: User, id: Uuid, sort: BidSort) -> Result<Vec<Bid>, Error> {
        let authorizor = self.authorizor.clone();
        let now = self.now();

        let mut bids: Vec<Bid> = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let request = fetch_request(tx, id, Lock::None).await?;
                    authorizor::authorize(&authorizor, user, "list_bids", request)?;

                    tx.bids_for_request(id, Lock::None).await
                })
            })
            .await?
            .into_iter()
            .map(|bid| bid.as_of(now))
            .collect();

        sort_bids(&mut bids, sort);

        Ok(bids)
    }
}
