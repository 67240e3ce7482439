use std::time::Duration;

use async_trait::async_trait;

use crate::profile::UserId;

/// Upper bound on a single content-generation call. A stuck generator must
/// not wedge the user's delivery cycle.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound on a single outgoing message.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ContentGenerator: Send + Sync + 'static {
    async fn generate(&self, language: &str, level: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait Messenger: Send + Sync + 'static {
    async fn send_message(&self, user_id: UserId, text: &str) -> anyhow::Result<()>;
}
