use std::sync::Arc;

use chrono::{DateTime, Utc};
use serenity::{
    all::{Context, EventHandler, Message, Ready},
    async_trait,
};
use tokio::sync::watch;
use tracing::{debug, info};

use edbot_core::{
    config::ConfigStore,
    domain::{ChannelId, UserId},
    gallery::GalleryArchiver,
    messaging::types::{Attachment, IncomingMessage},
};

/// Gateway event handler: flips the ready signal and feeds the gallery archiver.
pub struct Handler {
    config: Arc<ConfigStore>,
    archiver: Arc<GalleryArchiver>,
    ready: watch::Sender<bool>,
}

impl Handler {
    pub fn new(
        config: Arc<ConfigStore>,
        archiver: Arc<GalleryArchiver>,
        ready: watch::Sender<bool>,
    ) -> Self {
        Self {
            config,
            archiver,
            ready,
        }
    }
}

pub fn to_incoming(msg: &Message) -> IncomingMessage {
    let timestamp = DateTime::<Utc>::from_timestamp(msg.timestamp.unix_timestamp(), 0)
        .unwrap_or_else(Utc::now);
    IncomingMessage {
        author_id: UserId(msg.author.id.get()),
        author_name: msg.author.name.clone(),
        channel_id: ChannelId(msg.channel_id.get()),
        timestamp,
        attachments: msg
            .attachments
            .iter()
            .map(|a| Attachment {
                url: a.url.clone(),
                filename: a.filename.clone(),
            })
            .collect(),
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, id = %ready.user.id, "connected to discord");
        self.archiver.set_bot_user(UserId(ready.user.id.get()));
        self.ready.send_replace(true);
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if msg.attachments.is_empty() {
            return;
        }
        let cfg = self.config.snapshot();
        let report = self.archiver.on_message(&to_incoming(&msg), &cfg).await;
        if !report.saved.is_empty() || !report.failed.is_empty() {
            debug!(
                saved = report.saved.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "gallery message processed"
            );
        }
    }
}
