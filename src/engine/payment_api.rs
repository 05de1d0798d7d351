use super::helpers::rollback_lot;
use super::Engine;

use async_trait::async_trait;
use serde_json::json;

use crate::{
    api::PaymentAPI,
    auth::{Marketplace, User},
    entities::{DriverCredit, PaymentStatus},
    error::{payment_already_settled_error, payment_not_found_error, Error},
    external::{Event, Notification},
    store::{Lock, Store},
};

#[async_trait]
impl<S: Store> PaymentAPI for Engine<S> {
    #[tracing::instrument(skip(self))]
    async fn confirm_payment(
        &self,
        user: User,
        payment_id: String,
        succeeded: bool,
    ) -> Result<Option<DriverCredit>, Error> {
        self.authorize(user, "confirm_payment", Marketplace)?;

        let captured = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let mut lot = tx
                        .find_lot_by_payment(&payment_id, Lock::ForUpdate)
                        .await?
                        .ok_or_else(payment_not_found_error)?;

                    if succeeded {
                        lot.capture_payment()?;
                        tx.update_lot(&lot).await?;
                        return Ok(Some(lot));
                    }

                    if lot.payment_status != PaymentStatus::Pending {
                        return Err(payment_already_settled_error());
                    }

                    rollback_lot(tx, &lot).await?;

                    Ok(None)
                })
            })
            .await?;

        match &captured {
            Some(lot) => {
                tracing::info!(lot_id = %lot.id, "payment captured");

                self.notify(Notification {
                    recipient: lot.driver_id,
                    event: Event::CreditsPurchased,
                    payload: json!({
                        "lot_id": lot.id,
                        "credits": lot.credits_purchased,
                        "amount_paid": lot.amount_paid,
                    }),
                })
                .await;
            }
            None => tracing::info!("payment failed, lot rolled back"),
        }

        Ok(captured)
    }
}
