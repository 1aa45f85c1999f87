use async_trait::async_trait;

/// Outbound notification seam. Invite creation dispatches through this after
/// its transaction commits; delivery failures are logged and never propagated
/// back into the membership mutation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to_email: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Default notifier that only logs. Deployments wire in a real mail sender.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to_email: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        tracing::info!(to = to_email, subject, "notification dispatched");
        Ok(())
    }
}
