//! Discord adapter (serenity).
//!
//! This crate implements the `edbot-core` MessagingPort over the Discord
//! gateway and REST API, and forwards inbound messages to the gallery archiver.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use serenity::all::{CreateEmbed, CreateEmbedAuthor, CreateMessage, Http, ShardManager};
use tokio::sync::watch;
use tracing::debug;

pub mod handler;
pub mod router;

use edbot_core::{
    domain::{ChannelId, MessageId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::Embed},
    Result,
};

pub struct DiscordMessenger {
    http: Arc<Http>,
    shards: Arc<ShardManager>,
    ready: watch::Receiver<bool>,
    closed: AtomicBool,
}

impl DiscordMessenger {
    pub fn new(http: Arc<Http>, shards: Arc<ShardManager>, ready: watch::Receiver<bool>) -> Self {
        Self {
            http,
            shards,
            ready,
            closed: AtomicBool::new(false),
        }
    }

    /// Snowflakes are never zero; serenity panics on a zero id.
    fn dc_channel(channel_id: ChannelId) -> Option<serenity::all::ChannelId> {
        (channel_id.0 != 0).then(|| serenity::all::ChannelId::new(channel_id.0))
    }

    fn map_err(e: serenity::Error) -> Error {
        Error::Messaging(format!("discord error: {e}"))
    }

    fn dc_embed(embed: &Embed) -> CreateEmbed {
        let mut out = CreateEmbed::new()
            .title(&embed.title)
            .description(&embed.description);
        if let Some(author) = &embed.author {
            let mut a = CreateEmbedAuthor::new(&author.name);
            if let Some(url) = &author.url {
                a = a.url(url);
            }
            out = out.author(a);
        }
        for f in &embed.fields {
            out = out.field(&f.name, &f.value, f.inline);
        }
        out
    }
}

fn http_status(e: &serenity::Error) -> Option<u16> {
    match e {
        serenity::Error::Http(http) => http.status_code().map(|s| s.as_u16()),
        _ => None,
    }
}

/// 403/404 mean the channel is gone or hidden from the bot; anything else may clear up.
fn channel_missing(status: Option<u16>) -> bool {
    matches!(status, Some(403 | 404))
}

#[async_trait]
impl MessagingPort for DiscordMessenger {
    async fn wait_until_ready(&self) {
        let mut rx = self.ready.clone();
        // Err only when the handler (and its sender) is gone; nothing left to wait for.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn resolve_channel(&self, channel_id: ChannelId) -> Result<Option<ChannelId>> {
        let Some(id) = Self::dc_channel(channel_id) else {
            return Ok(None);
        };
        match self.http.get_channel(id).await {
            Ok(_) => Ok(Some(channel_id)),
            Err(e) if channel_missing(http_status(&e)) => {
                debug!(channel = %channel_id, "channel not found: {e}");
                Ok(None)
            }
            Err(e) => Err(Self::map_err(e)),
        }
    }

    async fn send_embed(
        &self,
        channel_id: ChannelId,
        content: &str,
        embed: &Embed,
    ) -> Result<MessageRef> {
        let id = Self::dc_channel(channel_id)
            .ok_or_else(|| Error::Messaging(format!("invalid channel id {channel_id}")))?;
        let message = CreateMessage::new()
            .content(content)
            .embed(Self::dc_embed(embed));
        let sent = id
            .send_message(self.http.as_ref(), message)
            .await
            .map_err(Self::map_err)?;

        Ok(MessageRef {
            channel_id,
            message_id: MessageId(sent.id.get()),
        })
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shards.shutdown_all().await;
    }
}
