//! The contract between the channel layer and the service layer. The
//! channel delivers opaque message bodies and channel lifecycle events; the
//! service layer is its single consumer.

use async_trait::async_trait;

use uasc_core::messages::ServiceMessage;
use uasc_types::StatusCode;

/// Implemented by the application's service layer.
///
/// All methods run on the connection's task; a slow handler stalls only its
/// own channel.
#[async_trait]
pub trait ServiceHandler: Send + Sync + 'static {
    /// A secure channel reached its active state.
    async fn on_open(&self, channel_id: u32);

    /// Handle one service request and produce the response message. Errors
    /// become service faults carrying the status; the channel stays up
    /// either way.
    async fn handle(
        &self,
        channel_id: u32,
        request: ServiceMessage,
    ) -> Result<ServiceMessage, StatusCode>;

    /// The peer aborted a partially transmitted request. The channel stays
    /// up; the default implementation ignores the event.
    async fn on_abort(&self, channel_id: u32, request_id: u32, status: StatusCode) {
        let _ = (channel_id, request_id, status);
    }

    /// The channel closed with the given status. No further calls for this
    /// channel id will follow.
    async fn on_close(&self, channel_id: u32, status: StatusCode);
}
