#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use rideboard::api::CreditAPI;
use rideboard::auth::{Role, User};
use rideboard::engine::{Clock, Engine};
use rideboard::entities::{BidOffer, DriverCredit, NewRide, NewRideRequest};
use rideboard::error::{upstream_error, Error};
use rideboard::external::{KeywordModerator, Moderator, Notification, Notifier, Verdict};
use rideboard::store::MemStore;

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), Error> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: Notification) -> Result<(), Error> {
        Err(upstream_error())
    }
}

pub struct UnreachableModerator;

#[async_trait]
impl Moderator for UnreachableModerator {
    async fn moderate(&self, _text: &str) -> Result<Verdict, Error> {
        Err(upstream_error())
    }
}

pub struct Harness {
    pub engine: Arc<Engine<MemStore>>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub admin: User,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(|engine| engine)
    }

    pub fn with_failing_notifier() -> Self {
        Self::build(|engine| engine.with_notifier(Arc::new(FailingNotifier)))
    }

    pub fn with_blocklist(terms: &[&str]) -> Self {
        Self::with_moderator(Arc::new(KeywordModerator::new(terms)))
    }

    pub fn with_moderator(moderator: Arc<dyn Moderator>) -> Self {
        Self::build(move |engine| engine.with_moderator(moderator))
    }

    fn build<F>(customize: F) -> Self
    where
        F: FnOnce(Engine<MemStore>) -> Engine<MemStore>,
    {
        let clock = Arc::new(ManualClock(Mutex::new(Utc::now())));
        let notifier = Arc::new(RecordingNotifier::default());

        let engine = Engine::new(MemStore::new())
            .unwrap()
            .with_clock(clock.clone())
            .with_notifier(notifier.clone());

        Self {
            engine: Arc::new(customize(engine)),
            clock,
            notifier,
            admin: User::new(Uuid::new_v4(), Role::Admin),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Grants `credits` to the driver through a package purchase that needs no payment.
    pub async fn fund(&self, driver: &User, credits: u32) -> DriverCredit {
        let package = self
            .engine
            .create_package(
                self.admin.clone(),
                format!("{} credits", credits),
                credits,
                Decimal::from(credits) * dec!(5),
            )
            .await
            .unwrap();

        self.engine
            .purchase_credits(driver.clone(), package.id, None)
            .await
            .unwrap()
    }

    pub async fn balance(&self, driver: &User) -> u64 {
        self.engine
            .credit_account(self.admin.clone(), driver.id)
            .await
            .unwrap()
            .balance
    }
}

pub fn driver() -> User {
    User::new(Uuid::new_v4(), Role::Driver)
}

pub fn passenger() -> User {
    User::new(Uuid::new_v4(), Role::Passenger)
}

pub fn request_params(now: DateTime<Utc>) -> NewRideRequest {
    NewRideRequest {
        origin_city_id: Uuid::new_v4(),
        destination_city_id: Uuid::new_v4(),
        preferred_date_time: now + Duration::days(3),
        time_flexibility: 2,
        seats_needed: 1,
        min_budget: Some(dec!(20)),
        max_budget: Some(dec!(40)),
        notes: None,
        expires_at: None,
    }
}

pub fn offer(price: Decimal) -> BidOffer {
    BidOffer {
        price_offer: price,
        proposed_date_time: None,
        message: None,
    }
}

pub fn ride_params(now: DateTime<Utc>, departs_in_hours: i64, seats: u32) -> NewRide {
    NewRide {
        origin_city_id: Uuid::new_v4(),
        destination_city_id: Uuid::new_v4(),
        departure_time: now + Duration::hours(departs_in_hours),
        total_seats: seats,
        price_per_seat: dec!(15),
        description: None,
    }
}
