use std::sync::Arc;

use serenity::{all::GatewayIntents, Client};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use edbot_core::{
    config::ConfigStore,
    gallery::{GalleryArchiver, HttpAttachmentFetcher},
    messaging::port::MessagingPort,
    news::{
        self,
        feed::FeedSource,
        galnet::GalnetSource,
        poller::{LoopExit, PollLoop},
        NewsSource,
    },
};

use crate::{handler::Handler, DiscordMessenger};

/// Connect to Discord and run until the gateway stops or a shutdown signal arrives.
///
/// The auth token and the set of enabled news loops are taken from the config
/// snapshot at startup; everything else is re-read by the loops each cycle.
pub async fn run(store: Arc<ConfigStore>) -> anyhow::Result<()> {
    let cfg = store.snapshot();
    let cancel = CancellationToken::new();
    let watcher = store.spawn_watcher(cancel.clone());

    let http_client = news::http_client()?;
    let archiver = Arc::new(GalleryArchiver::new(Arc::new(HttpAttachmentFetcher::new(
        http_client.clone(),
    ))));

    let (ready_tx, ready_rx) = watch::channel(false);
    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&cfg.discord_auth_token, intents)
        .event_handler(Handler::new(store.clone(), archiver, ready_tx))
        .await?;

    let messenger = Arc::new(DiscordMessenger::new(
        client.http.clone(),
        client.shard_manager.clone(),
        ready_rx,
    ));

    let mut sources: Vec<Arc<dyn NewsSource>> = Vec::new();
    if cfg.post_galnet_news {
        sources.push(Arc::new(GalnetSource::new(http_client.clone())));
    }
    if cfg.post_website_news {
        sources.push(Arc::new(FeedSource::new(http_client)));
    }
    let loops: Vec<(&'static str, JoinHandle<LoopExit>)> = sources
        .into_iter()
        .map(|source| {
            let name = source.name();
            info!(source = name, "news loop enabled");
            let handle =
                PollLoop::new(source, messenger.clone(), store.clone()).spawn(cancel.clone());
            (name, handle)
        })
        .collect();

    let shutdown = {
        let cancel = cancel.clone();
        let messenger = messenger.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = wait_for_signal() => {
                    info!("shutdown requested");
                    cancel.cancel();
                    messenger.close().await;
                }
            }
        })
    };

    let result = client.start().await;
    if let Err(e) = &result {
        error!("discord client stopped: {e}");
    }

    cancel.cancel();
    messenger.close().await;
    for (name, handle) in loops {
        match handle.await {
            Ok(exit) => info!(source = name, ?exit, "news loop ended"),
            Err(e) => warn!(source = name, "news loop task failed: {e}"),
        }
    }
    let _ = shutdown.await;
    let _ = watcher.await;

    result?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("cannot install SIGTERM handler: {e}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
