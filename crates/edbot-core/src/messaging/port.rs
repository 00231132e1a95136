use async_trait::async_trait;

use crate::{
    domain::{ChannelId, MessageRef},
    messaging::types::Embed,
    Result,
};

/// Messaging session port.
///
/// Discord is the only implementation; the poll loops and the gallery
/// archiver depend on this trait alone so they can be driven by fakes in tests.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Resolves once the session has connected and is ready to send.
    async fn wait_until_ready(&self);

    fn is_closed(&self) -> bool;

    /// Look up a channel the bot can post into.
    ///
    /// `Ok(None)` when the channel does not exist or the bot cannot see it;
    /// `Err` for transport failures worth retrying.
    async fn resolve_channel(&self, channel_id: ChannelId) -> Result<Option<ChannelId>>;

    async fn send_embed(
        &self,
        channel_id: ChannelId,
        content: &str,
        embed: &Embed,
    ) -> Result<MessageRef>;

    /// Request a cooperative shutdown of the session.
    async fn close(&self);
}
