use chrono::{DateTime, Utc};
use feed_rs::model::FeedType;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::util::{collapse_whitespace, strip_control_chars};

/// Syndication formats a fetched document may be decoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    /// RSS 2.0 (and the 0.9x dialects it grew out of)
    Rss2,
    Atom,
    /// RSS 1.0 / RDF Site Summary
    Rss1,
}

impl FeedFormat {
    /// Order in which candidate documents are tried.
    pub const DISCOVERY_ORDER: [FeedFormat; 3] =
        [FeedFormat::Rss2, FeedFormat::Atom, FeedFormat::Rss1];

    fn accepts(self, feed_type: &FeedType) -> bool {
        matches!(
            (self, feed_type),
            (FeedFormat::Rss2, FeedType::RSS2 | FeedType::RSS0)
                | (FeedFormat::Atom, FeedType::Atom)
                | (FeedFormat::Rss1, FeedType::RSS1)
        )
    }
}

impl std::fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FeedFormat::Rss2 => "RSS 2.0",
            FeedFormat::Atom => "Atom",
            FeedFormat::Rss1 => "RSS 1.0",
        })
    }
}

/// A decoded feed document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feed {
    pub format: FeedFormat,
    pub title: String,
    pub description: Option<String>,
    /// Website the feed belongs to, when the feed names one other than itself
    pub site_link: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub articles: Vec<FeedArticle>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedArticle {
    pub guid: String,
    pub title: String,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// Why a document did not decode as a feed.
///
/// Callers treat this as "not a feed, look for autodiscovery links", never
/// as a failure.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a feed document: {0}")]
    Syntax(String),
    #[error("feed type {0} is not one of the accepted formats")]
    UnsupportedFormat(String),
}

/// Decodes `bytes` as a feed in one of `formats`, trying them in order.
///
/// The document is parsed once; the first format in `formats` that matches
/// the detected document type wins. `feed_url` is the address the bytes came
/// from and is never reported as the feed's site link.
pub fn decode(
    bytes: &[u8],
    feed_url: &str,
    formats: &[FeedFormat],
) -> Result<Feed, DecodeError> {
    let parsed =
        feed_rs::parser::parse(bytes).map_err(|e| DecodeError::Syntax(e.to_string()))?;

    let format = formats
        .iter()
        .copied()
        .find(|format| format.accepts(&parsed.feed_type))
        .ok_or_else(|| DecodeError::UnsupportedFormat(format!("{:?}", parsed.feed_type)))?;

    let title = parsed
        .title
        .map(|t| clean_text(&t.content))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled Feed".to_owned());

    let description = parsed
        .description
        .map(|d| clean_text(&d.content))
        .filter(|d| !d.is_empty());

    let site_link = parsed
        .links
        .iter()
        .map(|link| strip_control_chars(&link.href).into_owned())
        .find(|href| href != feed_url);

    let articles = parsed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());
            let published = entry.published.or(entry.updated);
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|s| strip_control_chars(&s).into_owned());
            let title = entry
                .title
                .map(|t| clean_text(&t.content))
                .unwrap_or_else(|| "Untitled".to_owned());

            let existing_id = Some(entry.id.as_str()).filter(|id| !id.trim().is_empty());
            let guid = generate_guid(existing_id, link.as_deref(), &title, published);

            FeedArticle {
                guid,
                title,
                link,
                published,
                summary,
            }
        })
        .collect();

    Ok(Feed {
        format,
        title,
        description,
        site_link,
        updated: parsed.updated,
        articles,
    })
}

fn clean_text(s: &str) -> String {
    collapse_whitespace(&strip_control_chars(s))
}

fn generate_guid(
    existing: Option<&str>,
    link: Option<&str>,
    title: &str,
    published: Option<DateTime<Utc>>,
) -> String {
    if let Some(guid) = existing {
        return guid.trim().to_owned();
    }

    let input = format!(
        "{}|{}|{}",
        link.unwrap_or(""),
        title,
        published.map(|p| p.timestamp().to_string()).unwrap_or_default()
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
