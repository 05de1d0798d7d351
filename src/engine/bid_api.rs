use super::helpers::{fetch_bid, fetch_request};
use super::Engine;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::{
    api::BidAPI,
    auth::{authorizor, Marketplace, User},
    entities::{Bid, BidOffer},
    error::{bid_not_found_error, request_not_open_error, Error},
    external::{Event, Notification},
    store::{Lock, Store},
};

#[async_trait]
impl<S: Store> BidAPI for Engine<S> {
    #[tracing::instrument(skip(self))]
    async fn create_bid(
        &self,
        user: User,
        request_id: Uuid,
        offer: BidOffer,
    ) -> Result<Bid, Error> {
        self.authorize_creation(user.clone(), "create_bid")?;
        self.moderate(offer.message.as_deref()).await?;

        let driver_id = user.id;
        let now = self.now();

        let bid = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    // serializes with acceptance and cancellation of the same request
                    let request = fetch_request(tx, request_id, Lock::ForUpdate).await?;

                    let bid = Bid::new(&request, driver_id, offer, now)?;

                    // a lapsed bid no longer holds the driver's slot on this request
                    for mut lapsed in tx.bids_for_request(request_id, Lock::ForUpdate).await? {
                        if lapsed.driver_id == driver_id
                            && lapsed.is_pending()
                            && lapsed.is_expired(now)
                        {
                            lapsed.reject(now)?;
                            tx.update_bid(&lapsed).await?;
                        }
                    }

                    tx.insert_bid(&bid).await?;

                    Ok(bid)
                })
            })
            .await?;

        tracing::info!(bid_id = %bid.id, "bid placed");

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn update_bid(&self, user: User, id: Uuid, offer: BidOffer) -> Result<Bid, Error> {
        self.moderate(offer.message.as_deref()).await?;

        let authorizor = self.authorizor.clone();
        let now = self.now();

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let request_id = fetch_bid(tx, id, Lock::None).await?.request_id;
                    let request = fetch_request(tx, request_id, Lock::ForUpdate).await?;

                    let mut bid = fetch_bid(tx, id, Lock::ForUpdate).await?;
                    authorizor::authorize(&authorizor, user, "update", bid.clone())?;

                    bid.revise(&request, offer, now)?;
                    tx.update_bid(&bid).await?;

                    Ok(bid)
                })
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn withdraw_bid(&self, user: User, id: Uuid) -> Result<Bid, Error> {
        let authorizor = self.authorizor.clone();
        let now = self.now();

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let mut bid = fetch_bid(tx, id, Lock::ForUpdate).await?;
                    authorizor::authorize(&authorizor, user, "withdraw", bid.clone())?;

                    bid.reject(now)?;
                    tx.update_bid(&bid).await?;

                    Ok(bid)
                })
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn accept_bid(&self, user: User, id: Uuid) -> Result<Bid, Error> {
        let authorizor = self.authorizor.clone();
        let now = self.now();

        let (bid, rejected) = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let request_id = fetch_bid(tx, id, Lock::None).await?.request_id;

                    // request first, then its bids
                    let mut request = fetch_request(tx, request_id, Lock::ForUpdate).await?;
                    authorizor::authorize(&authorizor, user, "decide_bids", request.clone())?;

                    if !request.is_open() {
                        return Err(request_not_open_error());
                    }

                    let bids = tx.bids_for_request(request_id, Lock::ForUpdate).await?;

                    let mut accepted = bids
                        .iter()
                        .find(|bid| bid.id == id)
                        .cloned()
                        .ok_or_else(bid_not_found_error)?;
                    accepted.accept(now)?;
                    tx.update_bid(&accepted).await?;

                    let mut rejected = 0;
                    for mut sibling in bids {
                        if sibling.id == id || !sibling.is_pending() {
                            continue;
                        }

                        sibling.reject(now)?;
                        tx.update_bid(&sibling).await?;
                        rejected += 1;
                    }

                    request.close()?;
                    tx.update_request(&request).await?;

                    Ok((accepted, rejected))
                })
            })
            .await?;

        tracing::info!(bid_id = %bid.id, request_id = %bid.request_id, rejected, "bid accepted");

        self.notify(Notification {
            recipient: bid.driver_id,
            event: Event::BidAccepted,
            payload: json!({
                "bid_id": bid.id,
                "request_id": bid.request_id,
                "price_offer": bid.price_offer,
            }),
        })
        .await;

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn reject_bid(&self, user: User, id: Uuid) -> Result<Bid, Error> {
        let authorizor = self.authorizor.clone();
        let now = self.now();

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let request_id = fetch_bid(tx, id, Lock::None).await?.request_id;
                    let request = fetch_request(tx, request_id, Lock::ForUpdate).await?;
                    authorizor::authorize(&authorizor, user, "decide_bids", request)?;

                    let mut bid = fetch_bid(tx, id, Lock::ForUpdate).await?;
                    bid.reject(now)?;
                    tx.update_bid(&bid).await?;

                    Ok(bid)
                })
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn driver_bids(&self, user: User) -> Result<Vec<Bid>, Error> {
        self.authorize(user.clone(), "browse", Marketplace)?;

        let driver_id = user.id;
        let now = self.now();

        let bids = self
            .store
            .with_transaction(move |tx| Box::pin(async move { tx.bids_by_driver(driver_id).await }))
            .await?;

        Ok(bids.into_iter().map(|bid| bid.as_of(now)).collect())
    }
}
