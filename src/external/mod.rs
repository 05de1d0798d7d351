pub mod moderation;
pub mod notifier;

pub use moderation::{HttpModerator, KeywordModerator, Moderator, Verdict};
pub use notifier::{Event, Notification, Notifier, TracingNotifier, WebhookNotifier};
