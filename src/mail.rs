use async_trait::async_trait;
use tracing::info;

/// Outgoing mail. Delivery is fire-and-forget: callers spawn the send and
/// only log failures.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_confirmation(&self, to: &str, username: &str, link: &str) -> anyhow::Result<()>;
}

/// Writes the message to the log instead of sending it. Used when no mail
/// relay is configured.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation(&self, to: &str, username: &str, link: &str) -> anyhow::Result<()> {
        info!(%to, %username, %link, "confirmation email");
        Ok(())
    }
}
