use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    entities::{
        credit, Bid, Booking, CreditPackage, CreditTransaction, Deduction, DriverCredit, Ride,
        RideRequest,
    },
    error::{
        bid_not_found_error, booking_not_found_error, lot_not_found_error,
        package_not_found_error, request_not_found_error, ride_not_found_error, Error,
    },
    store::{Lock, Tx},
};

#[tracing::instrument(skip(tx))]
pub async fn fetch_request(tx: &mut dyn Tx, id: Uuid, lock: Lock) -> Result<RideRequest, Error> {
    tx.find_request(id, lock)
        .await?
        .ok_or_else(request_not_found_error)
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_bid(tx: &mut dyn Tx, id: Uuid, lock: Lock) -> Result<Bid, Error> {
    tx.find_bid(id, lock).await?.ok_or_else(bid_not_found_error)
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_package(tx: &mut dyn Tx, id: Uuid, lock: Lock) -> Result<CreditPackage, Error> {
    tx.find_package(id, lock)
        .await?
        .ok_or_else(package_not_found_error)
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_ride(tx: &mut dyn Tx, id: Uuid, lock: Lock) -> Result<Ride, Error> {
    tx.find_ride(id, lock).await?.ok_or_else(ride_not_found_error)
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_booking(tx: &mut dyn Tx, id: Uuid, lock: Lock) -> Result<Booking, Error> {
    tx.find_booking(id, lock)
        .await?
        .ok_or_else(booking_not_found_error)
}

/// Rejects every pending bid on the request except `keep`, returning how many changed.
#[tracing::instrument(skip(tx))]
pub async fn reject_pending_bids(
    tx: &mut dyn Tx,
    request_id: Uuid,
    keep: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<usize, Error> {
    let bids = tx.bids_for_request(request_id, Lock::ForUpdate).await?;
    let mut rejected = 0;

    for mut bid in bids {
        if !bid.is_pending() || Some(bid.id) == keep {
            continue;
        }

        bid.reject(now)?;
        tx.update_bid(&bid).await?;
        rejected += 1;
    }

    Ok(rejected)
}

/// Deducts the posting fee from `lots` and records one transaction per lot touched.
///
/// `lots` must have been read with [`Lock::ForUpdate`] in the same transaction.
#[tracing::instrument(skip(tx, lots))]
pub async fn charge_ride_post(
    tx: &mut dyn Tx,
    lots: &mut [DriverCredit],
    driver_id: Uuid,
    ride_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Deduction, Error> {
    let deduction = credit::deduct(lots, 1)?;

    for lot in &deduction.updated_lots {
        tx.update_lot(lot).await?;
    }

    for debit in &deduction.debits {
        let transaction = CreditTransaction::ride_post(driver_id, debit, ride_id, now);
        tx.insert_credit_transaction(&transaction).await?;
    }

    tracing::info!(lot_id = %deduction.consumed_lot_id, "ride post charged");

    Ok(deduction)
}

/// Removes a lot granted for a payment that did not go through.
#[tracing::instrument(skip(tx, lot), fields(lot_id = %lot.id))]
pub async fn rollback_lot(tx: &mut dyn Tx, lot: &DriverCredit) -> Result<(), Error> {
    if lot.credits_remaining < lot.credits_purchased {
        tracing::warn!(
            consumed = lot.credits_purchased - lot.credits_remaining,
            "rolling back a lot that was already drawn on"
        );
    }

    if !tx.delete_lot(lot.id).await? {
        return Err(lot_not_found_error());
    }

    Ok(())
}
