use async_trait::async_trait;
use tracing::info;

use crate::users::repo_types::User;

/// Delivers password reset links. The transport is up to the implementation.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    /// Returns once the notification is queued or sent.
    async fn send_reset_link(&self, user: &User) -> anyhow::Result<()>;
}

/// Records the request in the log and acknowledges it.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset_link(&self, user: &User) -> anyhow::Result<()> {
        info!(user_id = %user.id, email = %user.email, "password reset requested");
        Ok(())
    }
}
