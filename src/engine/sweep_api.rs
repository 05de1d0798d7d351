use super::helpers::reject_pending_bids;
use super::Engine;

use async_trait::async_trait;

use crate::{
    api::{MaintenanceAPI, SweepReport},
    auth::{Marketplace, User},
    error::Error,
    store::Store,
};

#[async_trait]
impl<S: Store> MaintenanceAPI for Engine<S> {
    /// Persists the expiry that reads already apply lazily. Running it twice changes nothing.
    #[tracing::instrument(skip(self))]
    async fn sweep_expired(&self, user: User) -> Result<SweepReport, Error> {
        self.authorize(user, "sweep", Marketplace)?;

        let now = self.now();

        let report = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let mut report = SweepReport::default();

                    for mut request in tx.expired_open_requests(now).await? {
                        request.close()?;
                        tx.update_request(&request).await?;
                        report.closed_requests += 1;

                        report.rejected_bids +=
                            reject_pending_bids(tx, request.id, None, now).await?;
                    }

                    for mut bid in tx.expired_pending_bids(now).await? {
                        bid.reject(now)?;
                        tx.update_bid(&bid).await?;
                        report.rejected_bids += 1;
                    }

                    Ok(report)
                })
            })
            .await?;

        tracing::info!(
            closed_requests = report.closed_requests,
            rejected_bids = report.rejected_bids,
            "expired entries swept"
        );

        Ok(report)
    }
}
