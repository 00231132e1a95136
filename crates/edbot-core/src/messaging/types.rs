use chrono::{DateTime, Utc};

use crate::domain::{ChannelId, UserId};

/// Discord embed description limit (characters).
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;
/// Discord embed field value limit (characters).
pub const EMBED_FIELD_LIMIT: usize = 1024;
/// Discord limit for embed titles, author names and field names (characters).
pub const EMBED_TITLE_LIMIT: usize = 256;

/// Structured notification payload (platform-neutral embed).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub author: Option<EmbedAuthor>,
    pub fields: Vec<EmbedField>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbedAuthor {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl Embed {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: truncate_chars(&title.into(), EMBED_TITLE_LIMIT),
            description: truncate_chars(&description.into(), EMBED_DESCRIPTION_LIMIT),
            author: None,
            fields: Vec::new(),
        }
    }

    pub fn author(mut self, name: impl Into<String>, url: Option<String>) -> Self {
        self.author = Some(EmbedAuthor {
            name: truncate_chars(&name.into(), EMBED_TITLE_LIMIT),
            url,
        });
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: truncate_chars(&name.into(), EMBED_TITLE_LIMIT),
            value: truncate_chars(&value.into(), EMBED_FIELD_LIMIT),
            inline: true,
        });
        self
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Inbound chat message, reduced to what the gallery archiver needs.
#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub author_id: UserId,
    pub author_name: String,
    pub channel_id: ChannelId,
    pub timestamp: DateTime<Utc>,
    pub attachments: Vec<Attachment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_is_truncated_on_char_boundary() {
        let long = "é".repeat(EMBED_DESCRIPTION_LIMIT + 10);
        let embed = Embed::new("t", long);
        assert_eq!(embed.description.chars().count(), EMBED_DESCRIPTION_LIMIT);
    }

    #[test]
    fn title_and_author_are_capped() {
        let embed = Embed::new("t".repeat(300), "d").author("a".repeat(300), None);
        assert_eq!(embed.title.chars().count(), EMBED_TITLE_LIMIT);
        assert_eq!(
            embed.author.unwrap().name.chars().count(),
            EMBED_TITLE_LIMIT
        );
    }

    #[test]
    fn builder_collects_fields_in_order() {
        let embed = Embed::new("t", "d")
            .author("Galnet News", None)
            .field("Post Date", "04 MAY 3306")
            .field("Author", "Cmdr");
        assert_eq!(embed.fields.len(), 2);
        assert_eq!(embed.fields[0].name, "Post Date");
        assert_eq!(embed.field_value("Author"), Some("Cmdr"));
        assert_eq!(embed.author.unwrap().name, "Galnet News");
    }
}
