use async_trait::async_trait;

/// Best-effort announcement channel. Implementations log failures instead of
/// returning them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str);
}
