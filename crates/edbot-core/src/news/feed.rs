use async_trait::async_trait;
use reqwest::header::{ETAG, LAST_MODIFIED};

use super::{dates, DisplayOptions, FetchedItem, FreshnessRule, NewsSource};
use crate::{config::Config, messaging::types::Embed, FetchError};

/// Website RSS/Atom feed (newest entry first).
#[derive(Clone)]
pub struct FeedSource {
    client: reqwest::Client,
}

impl FeedSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// 200, or one of the redirect statuses that still carry a usable feed.
pub fn is_accepted_status(status: u16) -> bool {
    matches!(status, 200 | 301..=304 | 307..=308)
}

/// Turn a raw feed response into its newest entry.
///
/// `revision` is the response's validation tag; a body that does not parse as
/// a feed counts as malformed and is rejected.
pub fn parse_response(
    status: u16,
    revision: Option<String>,
    body: &[u8],
) -> Result<FetchedItem, FetchError> {
    if !is_accepted_status(status) {
        return Err(FetchError::Unavailable(format!("feed returned HTTP {status}")));
    }

    let feed = feed_rs::parser::parse(body)
        .map_err(|e| FetchError::Unavailable(format!("malformed feed: {e}")))?;

    let source_name = feed.title.as_ref().map(|t| t.content.trim().to_string());
    let source_url = feed
        .links
        .get(1)
        .or_else(|| feed.links.first())
        .map(|l| l.href.clone());

    let entry = feed
        .entries
        .first()
        .ok_or_else(|| FetchError::Unavailable("feed has no entries".to_string()))?;

    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .ok_or_else(|| FetchError::Unavailable("latest entry has no title".to_string()))?;

    let content = entry
        .content
        .as_ref()
        .and_then(|c| c.body.clone())
        .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
        .unwrap_or_default();

    let published = entry
        .published
        .or(entry.updated)
        .or(feed.updated)
        .ok_or_else(|| FetchError::Unavailable("latest entry has no date".to_string()))?;

    let permalink = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .or_else(|| Some(entry.id.clone()).filter(|id| !id.is_empty()));

    Ok(FetchedItem {
        title,
        content,
        author: entry.authors.first().map(|p| p.name.clone()),
        published,
        permalink,
        source_name,
        source_url,
        revision: revision.filter(|r| !r.is_empty()),
    })
}

#[async_trait]
impl NewsSource for FeedSource {
    fn name(&self) -> &'static str {
        "website"
    }

    fn rule(&self) -> FreshnessRule {
        FreshnessRule::DateAndRevision
    }

    fn endpoint(&self, cfg: &Config) -> Option<String> {
        cfg.rss_url.clone()
    }

    async fn fetch(&self, endpoint: &str) -> Result<FetchedItem, FetchError> {
        let resp = self.client.get(endpoint).send().await?;
        let status = resp.status().as_u16();
        // Servers without an ETag still send Last-Modified, which versions the feed the same way.
        let revision = resp
            .headers()
            .get(ETAG)
            .or_else(|| resp.headers().get(LAST_MODIFIED))
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp.bytes().await?;
        parse_response(status, revision, &body)
    }

    fn format(&self, item: &FetchedItem, display: &DisplayOptions) -> Embed {
        let name = item.source_name.as_deref().unwrap_or("Website");
        let mut embed = Embed::new(&item.title, html2md::parse_html(&item.content).trim())
            .author(format!("{name} News"), item.source_url.clone())
            .field("Post Date", dates::feed_display_date(item.published, display));
        if let Some(author) = &item.author {
            embed = embed.field("Author", author);
        }
        if let Some(link) = &item.permalink {
            embed = embed.field("Permalink", link);
        }
        embed
    }
}
