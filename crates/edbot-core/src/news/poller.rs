//! Per-source polling loop.
//!
//! Lifecycle: wait for the messaging session to be ready, then poll forever
//! (fetch → freshness check → format → dispatch → record → sleep). Missing
//! channel or endpoint configuration parks the loop for good; fetch and
//! dispatch failures are retried on the next interval.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{DisplayOptions, FreshnessState, NewsSource};
use crate::{
    config::{Config, ConfigStore},
    messaging::port::MessagingPort,
};

/// Why a poll loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    SessionClosed,
    /// News channel unset or not resolvable. Needs a config fix and restart.
    ChannelUnavailable,
    /// Source endpoint unset. Needs a config fix and restart.
    EndpointUnset,
}

/// Result of a single polling cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Posted,
    Unchanged,
    /// Channel lookup hit a transport error; retried next cycle.
    ChannelLookupFailed,
    FetchFailed,
    DispatchFailed,
    Fatal(LoopExit),
}

pub struct PollLoop {
    source: Arc<dyn NewsSource>,
    messenger: Arc<dyn MessagingPort>,
    config: Arc<ConfigStore>,
    state: FreshnessState,
}

impl PollLoop {
    pub fn new(
        source: Arc<dyn NewsSource>,
        messenger: Arc<dyn MessagingPort>,
        config: Arc<ConfigStore>,
    ) -> Self {
        Self {
            source,
            messenger,
            config,
            state: FreshnessState::default(),
        }
    }

    pub fn state(&self) -> &FreshnessState {
        &self.state
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<LoopExit> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(mut self, cancel: CancellationToken) -> LoopExit {
        let source = self.source.name();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return LoopExit::Cancelled,
            _ = self.messenger.wait_until_ready() => {}
        }
        info!(source, "starting news loop");

        loop {
            if self.messenger.is_closed() {
                info!(source, "session closed, stopping news loop");
                return LoopExit::SessionClosed;
            }

            let cfg = self.config.snapshot();
            if let CycleOutcome::Fatal(exit) = self.poll_once(&cfg).await {
                return exit;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(source, "shutdown requested, stopping news loop");
                    return LoopExit::Cancelled;
                }
                _ = sleep(cfg.check_interval) => {}
            }
        }
    }

    /// Run one cycle against the given config snapshot.
    pub async fn poll_once(&mut self, cfg: &Config) -> CycleOutcome {
        let source = self.source.name();

        let channel = match cfg.news_channel_id {
            Some(id) => match self.messenger.resolve_channel(id).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(source, channel_id = %id, "channel lookup failed, will retry: {e}");
                    return CycleOutcome::ChannelLookupFailed;
                }
            },
            None => None,
        };
        let Some(channel) = channel else {
            error!(
                source,
                channel_id = ?cfg.news_channel_id,
                "news loop enabled but no news channel set or no channel matches, exiting loop"
            );
            return CycleOutcome::Fatal(LoopExit::ChannelUnavailable);
        };

        let Some(endpoint) = self.source.endpoint(cfg) else {
            error!(source, "no endpoint configured, exiting loop");
            return CycleOutcome::Fatal(LoopExit::EndpointUnset);
        };

        let item = match self.source.fetch(&endpoint).await {
            Ok(item) => item,
            Err(e) => {
                error!(source, url = %endpoint, "fetch failed: {e}");
                return CycleOutcome::FetchFailed;
            }
        };

        if !self.source.rule().is_new(&self.state, &item) {
            debug!(source, title = %item.title, "latest item already posted");
            return CycleOutcome::Unchanged;
        }

        info!(source, title = %item.title, "new article found, posting");
        let embed = self
            .source
            .format(&item, &DisplayOptions::from_config(cfg));

        match self
            .messenger
            .send_embed(channel, &cfg.new_news_message, &embed)
            .await
        {
            Ok(_) => {
                self.state.record(&item);
                CycleOutcome::Posted
            }
            Err(e) => {
                warn!(source, channel_id = %channel, "dispatch failed, will retry: {e}");
                CycleOutcome::DispatchFailed
            }
        }
    }
}
