use std::sync::Arc;

use rideboard::api::{DynAPI, MaintenanceAPI};
use rideboard::auth::User;
use rideboard::config::Config;
use rideboard::engine::Engine;
use rideboard::error::Error;
use rideboard::external::{
    HttpModerator, KeywordModerator, Moderator, Notifier, TracingNotifier, WebhookNotifier,
};
use rideboard::server::serve;
use rideboard::store::PgStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;

    let store = PgStore::connect(&config.database_url, config.database_max_connections).await?;

    let notifier: Arc<dyn Notifier> = match config.notification_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(TracingNotifier),
    };

    let moderator: Arc<dyn Moderator> = match config.moderation_url {
        Some(url) => Arc::new(HttpModerator::new(url)),
        None => Arc::new(KeywordModerator::new(&config.moderation_blocklist)),
    };

    let engine = Arc::new(
        Engine::new(store)?
            .with_notifier(notifier)
            .with_moderator(moderator),
    );

    let sweeper = engine.clone();
    let sweep_interval = config.sweep_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);

        loop {
            interval.tick().await;

            if let Err(err) = sweeper.sweep_expired(User::new_system_user()).await {
                tracing::warn!(%err, "expiry sweep failed");
            }
        }
    });

    serve(engine as DynAPI, config.bind_addr).await
}
