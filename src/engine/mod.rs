mod bid_api;
mod booking_api;
mod credit_api;
mod helpers;
mod payment_api;
mod request_api;
mod ride_api;
mod sweep_api;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use oso::{Oso, ToPolar};

use crate::{
    api::API,
    auth::{authorizor, User},
    error::{content_rejected_error, phone_not_verified_error, Error},
    external::{KeywordModerator, Moderator, Notification, Notifier, TracingNotifier},
    store::Store,
};

/// Source of the current time for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct Engine<S> {
    store: S,
    authorizor: Arc<Oso>,
    notifier: Arc<dyn Notifier>,
    moderator: Arc<dyn Moderator>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> Engine<S> {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(store: S) -> Result<Self, Error> {
        Ok(Self {
            store,
            authorizor: Arc::new(authorizor::new()?),
            notifier: Arc::new(TracingNotifier),
            moderator: Arc::new(KeywordModerator::default()),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_moderator(mut self, moderator: Arc<dyn Moderator>) -> Self {
        self.moderator = moderator;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> Engine<S> {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn authorize<Resource>(
        &self,
        actor: User,
        action: &'static str,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Resource: ToPolar,
    {
        authorizor::authorize(&self.authorizor, actor, action, resource)
    }

    /// Marketplace actions that publish something need a verified phone on top of the role.
    fn authorize_creation(&self, actor: User, action: &'static str) -> Result<(), Error> {
        if !actor.phone_verified {
            return Err(phone_not_verified_error());
        }

        self.authorize(actor, action, crate::auth::Marketplace)
    }

    /// Rejected text fails the operation; an unreachable moderator does not.
    async fn moderate(&self, text: Option<&str>) -> Result<(), Error> {
        let text = match text.map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => return Ok(()),
        };

        match self.moderator.moderate(text).await {
            Ok(verdict) if verdict.approved => Ok(()),
            Ok(verdict) => Err(content_rejected_error(&verdict.reasons)),
            Err(err) => {
                tracing::warn!(%err, "moderation unavailable, accepting content");
                Ok(())
            }
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.notify(notification).await {
            tracing::warn!(%err, "notification failed");
        }
    }
}

impl<S: Store> API for Engine<S> {}

#[test]
fn new_engine() {
    use crate::api::CreditAPI;
    use crate::auth::Role;
    use crate::store::MemStore;
    use tokio_test::block_on;
    use uuid::Uuid;

    let engine = Engine::new(MemStore::new()).unwrap();
    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let packages = block_on(engine.list_packages(driver)).unwrap();

    assert!(packages.is_empty());
}
