//! Event publication.
//!
//! Game lifecycle events go to a message broker so other services (the
//! lobby, stats, matchmaking) can react. The broker itself is outside this
//! crate; [`Publisher`] is the seam.

use std::convert::Infallible;
use std::future::Future;

/// Fire-and-forget event sink.
///
/// Implementations must treat an empty message as a successful no-op.
pub trait Publisher: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn publish(
        &self,
        message: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Writes every event to the log instead of a broker.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPublisher;

impl Publisher for TracingPublisher {
    type Error = Infallible;

    async fn publish(&self, message: &str) -> Result<(), Infallible> {
        if !message.is_empty() {
            tracing::info!(event = %message, "event published");
        }
        Ok(())
    }
}
