use super::helpers::{fetch_package, rollback_lot};
use super::Engine;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    api::CreditAPI,
    auth::{Marketplace, User},
    entities::{CreditAccount, CreditPackage, CreditTransaction, DriverCredit},
    error::{invalid_input_error, lot_not_found_error, package_not_found_error, Error},
    store::{Lock, Store},
};

#[async_trait]
impl<S: Store> CreditAPI for Engine<S> {
    #[tracing::instrument(skip(self))]
    async fn create_package(
        &self,
        user: User,
        name: String,
        credits: u32,
        price: Decimal,
    ) -> Result<CreditPackage, Error> {
        self.authorize(user, "manage_packages", Marketplace)?;

        let package = CreditPackage::new(name, credits, price)?;

        let created = package.clone();
        self.store
            .with_transaction(move |tx| Box::pin(async move { tx.insert_package(&created).await }))
            .await?;

        Ok(package)
    }

    #[tracing::instrument(skip(self))]
    async fn deactivate_package(&self, user: User, id: Uuid) -> Result<CreditPackage, Error> {
        self.authorize(user, "manage_packages", Marketplace)?;

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let mut package = fetch_package(tx, id, Lock::ForUpdate).await?;

                    package.active = false;
                    tx.update_package(&package).await?;

                    Ok(package)
                })
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn list_packages(&self, user: User) -> Result<Vec<CreditPackage>, Error> {
        self.authorize(user, "browse", Marketplace)?;

        self.store
            .with_transaction(|tx| Box::pin(async move { tx.active_packages().await }))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn purchase_credits(
        &self,
        user: User,
        package_id: Uuid,
        payment_id: Option<String>,
    ) -> Result<DriverCredit, Error> {
        self.authorize(user.clone(), "purchase_credits", Marketplace)?;

        if matches!(&payment_id, Some(payment_id) if payment_id.trim().is_empty()) {
            return Err(invalid_input_error("payment id cannot be blank"));
        }

        let driver_id = user.id;
        let now = self.now();

        let lot = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let package = fetch_package(tx, package_id, Lock::None).await?;
                    if !package.active {
                        return Err(package_not_found_error());
                    }

                    let lot = DriverCredit::purchase(
                        driver_id,
                        package.id,
                        package.credits,
                        package.price,
                        payment_id,
                        now,
                    )?;
                    tx.insert_lot(&lot).await?;

                    Ok(lot)
                })
            })
            .await?;

        tracing::info!(lot_id = %lot.id, credits = lot.credits_purchased, "credits purchased");

        Ok(lot)
    }

    #[tracing::instrument(skip(self))]
    async fn credit_account(&self, user: User, driver_id: Uuid) -> Result<CreditAccount, Error> {
        let lots = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move { tx.lots_for_driver(driver_id, Lock::None).await })
            })
            .await?;

        let account = CreditAccount::new(driver_id, lots);
        self.authorize(user, "read", account.clone())?;

        Ok(account)
    }

    #[tracing::instrument(skip(self))]
    async fn credit_transactions(
        &self,
        user: User,
        driver_id: Uuid,
    ) -> Result<Vec<CreditTransaction>, Error> {
        self.authorize(user, "read", CreditAccount::new(driver_id, vec![]))?;

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move { tx.credit_transactions_for_driver(driver_id).await })
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn refund_credits(
        &self,
        user: User,
        driver_id: Uuid,
        credits: u32,
        reason: String,
    ) -> Result<DriverCredit, Error> {
        self.authorize(user, "refund_credits", Marketplace)?;

        let lot = DriverCredit::adjustment(driver_id, credits, reason, self.now())?;

        let granted = lot.clone();
        self.store
            .with_transaction(move |tx| Box::pin(async move { tx.insert_lot(&granted).await }))
            .await?;

        tracing::info!(lot_id = %lot.id, %driver_id, credits, "credits refunded");

        Ok(lot)
    }

    #[tracing::instrument(skip(self))]
    async fn rollback_lot(&self, user: User, lot_id: Uuid) -> Result<(), Error> {
        self.authorize(user, "confirm_payment", Marketplace)?;

        self.store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let lot = tx
                        .find_lot(lot_id, Lock::ForUpdate)
                        .await?
                        .ok_or_else(lot_not_found_error)?;

                    rollback_lot(tx, &lot).await
                })
            })
            .await
    }
}
