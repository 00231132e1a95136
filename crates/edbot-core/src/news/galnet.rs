use async_trait::async_trait;
use serde::Deserialize;

use super::{dates, DisplayOptions, FetchedItem, FreshnessRule, NewsSource};
use crate::{config::Config, messaging::types::Embed, FetchError};

pub const GALNET_AUTHOR: &str = "Galnet News";
pub const GALNET_URL: &str = "https://community.elitedangerous.com/en/galnet";

/// Paragraph break the GalNet API leaves in article bodies.
const DOUBLE_BREAK: &str = "<br /><br />  ";

#[derive(Debug, Deserialize)]
struct GalnetArticle {
    title: String,
    content: String,
    date: String,
}

/// Elite Dangerous GalNet JSON API (newest article first).
#[derive(Clone)]
pub struct GalnetSource {
    client: reqwest::Client,
}

impl GalnetSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Only a plain 200 carries an article list.
pub fn is_accepted_status(status: u16) -> bool {
    status == 200
}

/// Parse an API response body into the newest article.
pub fn parse_response(body: &[u8]) -> Result<FetchedItem, FetchError> {
    let articles: Vec<GalnetArticle> = serde_json::from_slice(body)
        .map_err(|e| FetchError::Unavailable(format!("invalid galnet payload: {e}")))?;
    let latest = articles
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Unavailable("galnet returned no articles".to_string()))?;

    let published = dates::parse_galnet_date(&latest.date).ok_or_else(|| {
        FetchError::Unavailable(format!("unparseable galnet date: {:?}", latest.date))
    })?;

    Ok(FetchedItem {
        title: latest.title,
        content: latest.content,
        author: None,
        published,
        permalink: None,
        source_name: Some(GALNET_AUTHOR.to_string()),
        source_url: Some(GALNET_URL.to_string()),
        revision: None,
    })
}

#[async_trait]
impl NewsSource for GalnetSource {
    fn name(&self) -> &'static str {
        "galnet"
    }

    fn rule(&self) -> FreshnessRule {
        FreshnessRule::LatestDate
    }

    fn endpoint(&self, cfg: &Config) -> Option<String> {
        cfg.galnet_api.clone()
    }

    async fn fetch(&self, endpoint: &str) -> Result<FetchedItem, FetchError> {
        let resp = self.client.get(endpoint).send().await?;
        let status = resp.status().as_u16();
        if !is_accepted_status(status) {
            return Err(FetchError::Unavailable(format!(
                "galnet api returned HTTP {status}"
            )));
        }
        let body = resp.bytes().await?;
        parse_response(&body)
    }

    fn format(&self, item: &FetchedItem, display: &DisplayOptions) -> Embed {
        Embed::new(&item.title, item.content.replace(DOUBLE_BREAK, "\n\n"))
            .author(GALNET_AUTHOR, Some(GALNET_URL.to_string()))
            .field(
                "Post Date",
                dates::galnet_display_date(item.published, display),
            )
    }
}
