//! Driver credit ledger.
//!
//! A driver's balance is split across lots, one per purchase or administrative
//! adjustment. Deductions consume the oldest lot with credits left first, so every
//! ride post can be traced back to the purchase that paid for it.

use chrono::{DateTime, Utc};
use oso::PolarClass;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{
    insufficient_credits_error, invalid_input_error, payment_already_settled_error, Error,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreditPackage {
    pub id: Uuid,
    pub name: String,
    pub credits: u32,
    pub price: Decimal,
    pub active: bool,
}

impl CreditPackage {
    pub fn new(name: String, credits: u32, price: Decimal) -> Result<Self, Error> {
        if name.trim().is_empty() {
            return Err(invalid_input_error("package name cannot be empty"));
        }

        if credits == 0 {
            return Err(invalid_input_error("package must grant at least one credit"));
        }

        if price < Decimal::ZERO {
            return Err(invalid_input_error("package price cannot be negative"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            credits,
            price,
            active: true,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Purchase,
    Adjustment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Captured,
    NotRequired,
}

/// One purchased batch of ride-posting credits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverCredit {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub package_id: Option<Uuid>,
    pub credits_purchased: u32,
    pub credits_remaining: u32,
    pub amount_paid: Decimal,
    pub purchased_at: DateTime<Utc>,
    pub source: Source,
    pub reason: Option<String>,
    pub payment_id: Option<String>,
    pub payment_status: PaymentStatus,
}

impl DriverCredit {
    pub fn purchase(
        driver_id: Uuid,
        package_id: Uuid,
        credits_purchased: u32,
        amount_paid: Decimal,
        payment_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        if credits_purchased == 0 {
            return Err(invalid_input_error("credits purchased must be positive"));
        }

        let payment_status = match payment_id {
            Some(_) => PaymentStatus::Pending,
            None => PaymentStatus::NotRequired,
        };

        Ok(Self {
            id: Uuid::new_v4(),
            driver_id,
            package_id: Some(package_id),
            credits_purchased,
            credits_remaining: credits_purchased,
            amount_paid,
            purchased_at: now,
            source: Source::Purchase,
            reason: None,
            payment_id,
            payment_status,
        })
    }

    /// Administrative grant; always a fresh lot so the audit trail is preserved.
    pub fn adjustment(
        driver_id: Uuid,
        credits: u32,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        if credits == 0 {
            return Err(invalid_input_error("refunded credits must be positive"));
        }

        if reason.trim().is_empty() {
            return Err(invalid_input_error("a refund needs a reason"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            driver_id,
            package_id: None,
            credits_purchased: credits,
            credits_remaining: credits,
            amount_paid: Decimal::ZERO,
            purchased_at: now,
            source: Source::Adjustment,
            reason: Some(reason),
            payment_id: None,
            payment_status: PaymentStatus::NotRequired,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.credits_remaining == 0
    }

    /// Takes up to `wanted` credits from this lot and returns how many it gave.
    fn consume(&mut self, wanted: u32) -> u32 {
        let taken = wanted.min(self.credits_remaining);
        self.credits_remaining -= taken;
        taken
    }

    pub fn capture_payment(&mut self) -> Result<(), Error> {
        match self.payment_status {
            PaymentStatus::Pending => {
                self.payment_status = PaymentStatus::Captured;
                Ok(())
            }
            _ => Err(payment_already_settled_error()),
        }
    }
}

pub fn balance(lots: &[DriverCredit]) -> u64 {
    lots.iter().map(|lot| u64::from(lot.credits_remaining)).sum()
}

pub fn can_post(lots: &[DriverCredit]) -> bool {
    balance(lots) > 0
}

/// A single lot's share of a deduction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Debit {
    pub lot_id: Uuid,
    pub credits: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct Deduction {
    /// First lot that absorbed credits; ride-post transactions are attributed to it.
    pub consumed_lot_id: Uuid,
    pub debits: Vec<Debit>,
    pub updated_lots: Vec<DriverCredit>,
}

/// Consumes `amount` credits oldest-lot-first.
///
/// `lots` is reordered by purchase time. On error no lot is modified.
pub fn deduct(lots: &mut [DriverCredit], amount: u32) -> Result<Deduction, Error> {
    if amount == 0 {
        return Err(invalid_input_error("deduction must be positive"));
    }

    if balance(lots) < u64::from(amount) {
        return Err(insufficient_credits_error());
    }

    lots.sort_by(|a, b| {
        a.purchased_at
            .cmp(&b.purchased_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut outstanding = amount;
    let mut debits = Vec::new();
    let mut updated_lots = Vec::new();

    for lot in lots.iter_mut().filter(|lot| !lot.is_exhausted()) {
        let taken = lot.consume(outstanding);
        outstanding -= taken;

        debits.push(Debit {
            lot_id: lot.id,
            credits: taken,
        });
        updated_lots.push(lot.clone());

        if outstanding == 0 {
            break;
        }
    }

    let consumed_lot_id = debits
        .first()
        .map(|debit| debit.lot_id)
        .ok_or_else(insufficient_credits_error)?;

    Ok(Deduction {
        consumed_lot_id,
        debits,
        updated_lots,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    RidePost,
}

/// Audit record of one lot's contribution to a deduction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub credit_id: Uuid,
    pub driver_id: Uuid,
    pub ride_id: Option<Uuid>,
    pub credits_used: u32,
    pub transaction_type: TransactionType,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    pub fn ride_post(driver_id: Uuid, debit: &Debit, ride_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            credit_id: debit.lot_id,
            driver_id,
            ride_id: Some(ride_id),
            credits_used: debit.credits,
            transaction_type: TransactionType::RidePost,
            description: format!("ride {} posted", ride_id),
            created_at: now,
        }
    }
}

/// A driver's lots and their total, as returned to readers.
#[derive(Clone, Debug, Serialize, PolarClass)]
pub struct CreditAccount {
    #[polar(attribute)]
    pub driver_id: Uuid,
    pub balance: u64,
    pub lots: Vec<DriverCredit>,
}

impl CreditAccount {
    pub fn new(driver_id: Uuid, lots: Vec<DriverCredit>) -> Self {
        Self {
            driver_id,
            balance: balance(&lots),
            lots,
        }
    }

    pub fn can_post(&self) -> bool {
        self.balance > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn lot(driver_id: Uuid, credits: u32, purchased_at: DateTime<Utc>) -> DriverCredit {
        DriverCredit::purchase(
            driver_id,
            Uuid::new_v4(),
            credits,
            dec!(10),
            None,
            purchased_at,
        )
        .unwrap()
    }

    #[test]
    fn deducts_from_oldest_lot_first() {
        let driver_id = Uuid::new_v4();
        let t1 = Utc::now() - Duration::days(2);
        let t2 = Utc::now() - Duration::days(1);

        let older = lot(driver_id, 1, t1);
        let newer = lot(driver_id, 5, t2);

        // deliberately out of order
        let mut lots = vec![newer.clone(), older.clone()];
        let deduction = deduct(&mut lots, 1).unwrap();

        assert_eq!(deduction.consumed_lot_id, older.id);
        assert_eq!(deduction.updated_lots.len(), 1);

        let older_after = lots.iter().find(|l| l.id == older.id).unwrap();
        let newer_after = lots.iter().find(|l| l.id == newer.id).unwrap();
        assert_eq!(older_after.credits_remaining, 0);
        assert_eq!(newer_after.credits_remaining, 5);
    }

    #[test]
    fn skips_exhausted_lots() {
        let driver_id = Uuid::new_v4();
        let now = Utc::now();

        let mut empty = lot(driver_id, 3, now - Duration::days(3));
        empty.credits_remaining = 0;
        let full = lot(driver_id, 2, now - Duration::days(1));

        let mut lots = vec![empty, full.clone()];
        let deduction = deduct(&mut lots, 1).unwrap();

        assert_eq!(deduction.consumed_lot_id, full.id);
        assert_eq!(balance(&lots), 1);
    }

    #[test]
    fn spans_lots_when_one_is_not_enough() {
        let driver_id = Uuid::new_v4();
        let now = Utc::now();
        let first = lot(driver_id, 1, now - Duration::days(2));
        let second = lot(driver_id, 4, now - Duration::days(1));

        let mut lots = vec![first.clone(), second.clone()];
        let deduction = deduct(&mut lots, 3).unwrap();

        assert_eq!(
            deduction.debits,
            vec![
                Debit {
                    lot_id: first.id,
                    credits: 1
                },
                Debit {
                    lot_id: second.id,
                    credits: 2
                },
            ]
        );
        assert_eq!(balance(&lots), 2);
    }

    #[test]
    fn insufficient_balance_leaves_lots_untouched() {
        let driver_id = Uuid::new_v4();
        let mut lots = vec![lot(driver_id, 1, Utc::now())];

        let err = deduct(&mut lots, 2).unwrap_err();

        assert_eq!(err.kind, ErrorKind::InsufficientResource);
        assert_eq!(balance(&lots), 1);
        assert!(deduct(&mut [], 1).is_err());
    }

    #[test]
    fn adjustment_is_a_free_standalone_lot() {
        let lot = DriverCredit::adjustment(Uuid::new_v4(), 2, "ride cancelled".into(), Utc::now())
            .unwrap();

        assert_eq!(lot.source, Source::Adjustment);
        assert_eq!(lot.amount_paid, Decimal::ZERO);
        assert_eq!(lot.package_id, None);
        assert_eq!(lot.credits_remaining, 2);
    }

    #[test]
    fn payment_can_only_be_captured_once() {
        let mut lot = DriverCredit::purchase(
            Uuid::new_v4(),
            Uuid::new_v4(),
            5,
            dec!(25),
            Some("pay_123".into()),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(lot.payment_status, PaymentStatus::Pending);
        lot.capture_payment().unwrap();
        assert_eq!(lot.payment_status, PaymentStatus::Captured);
        assert_eq!(
            lot.capture_payment().unwrap_err().kind,
            ErrorKind::InvalidState
        );
    }

    #[derive(Clone, Debug)]
    enum Op {
        Purchase(u32),
        Deduct(u32),
        Refund(u32),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..20).prop_map(Op::Purchase),
            (1u32..6).prop_map(Op::Deduct),
            (1u32..4).prop_map(Op::Refund),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Balance always equals the sum of what is left in each lot, and no lot
        /// ever goes negative or above what was bought.
        #[test]
        fn balance_matches_lots(ops in prop::collection::vec(arb_op(), 1..40)) {
            let driver_id = Uuid::new_v4();
            let start = Utc::now() - Duration::days(30);
            let mut lots: Vec<DriverCredit> = Vec::new();
            let mut expected: u64 = 0;

            for (i, op) in ops.iter().enumerate() {
                let at = start + Duration::minutes(i as i64);
                match op {
                    Op::Purchase(credits) => {
                        lots.push(lot(driver_id, *credits, at));
                        expected += u64::from(*credits);
                    }
                    Op::Refund(credits) => {
                        let lot =
                            DriverCredit::adjustment(driver_id, *credits, "adjustment".into(), at)
                                .unwrap();
                        lots.push(lot);
                        expected += u64::from(*credits);
                    }
                    Op::Deduct(amount) => {
                        match deduct(&mut lots, *amount) {
                            Ok(_) => expected -= u64::from(*amount),
                            Err(err) => {
                                prop_assert_eq!(err.kind, ErrorKind::InsufficientResource);
                                prop_assert!(expected < u64::from(*amount));
                            }
                        }
                    }
                }

                prop_assert_eq!(balance(&lots), expected);
                for lot in &lots {
                    prop_assert!(lot.credits_remaining <= lot.credits_purchased);
                }
            }
        }

        /// Every lot older than the one a deduction starts from is already empty.
        #[test]
        fn never_skips_an_older_lot(credits in prop::collection::vec(0u32..4, 1..10)) {
            let driver_id = Uuid::new_v4();
            let start = Utc::now() - Duration::days(30);
            let mut lots: Vec<DriverCredit> = credits
                .iter()
                .enumerate()
                .map(|(i, remaining)| {
                    let mut lot = lot(driver_id, 4, start + Duration::hours(i as i64));
                    lot.credits_remaining = *remaining;
                    lot
                })
                .collect();

            if let Ok(deduction) = deduct(&mut lots, 1) {
                let position = lots
                    .iter()
                    .position(|lot| lot.id == deduction.consumed_lot_id)
                    .unwrap();
                for older in &lots[..position] {
                    prop_assert_eq!(older.credits_remaining, 0);
                }
            }
        }
    }
}
