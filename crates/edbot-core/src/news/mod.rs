//! News sources polled into the news channel.
//!
//! Each source fetches its latest item, decides freshness with its own rule
//! and renders an embed. `poller` drives one loop per source.

pub mod dates;
pub mod feed;
pub mod freshness;
pub mod galnet;
pub mod poller;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{config::Config, messaging::types::Embed, FetchError, Result};

pub use dates::DisplayOptions;
pub use freshness::{FreshnessRule, FreshnessState};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("edbot/", env!("CARGO_PKG_VERSION"));

/// Latest item of a source, normalized. Either fully formed or not produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedItem {
    pub title: String,
    /// HTML or plain text, as published.
    pub content: String,
    pub author: Option<String>,
    pub published: DateTime<Utc>,
    pub permalink: Option<String>,
    /// Publisher display name (feed title).
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    /// Feed-wide revision tag (HTTP ETag) for sources that supply one.
    pub revision: Option<String>,
}

/// One pollable content source.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    fn rule(&self) -> FreshnessRule;

    /// Endpoint from the current config snapshot; `None` when unset.
    fn endpoint(&self, cfg: &Config) -> Option<String>;

    async fn fetch(&self, endpoint: &str) -> std::result::Result<FetchedItem, FetchError>;

    fn format(&self, item: &FetchedItem, display: &DisplayOptions) -> Embed;
}

/// Shared HTTP client for news and attachment downloads.
pub fn http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .build()?;
    Ok(client)
}
