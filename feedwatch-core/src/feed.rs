use chrono::{DateTime, Utc};
use html2text::render::text_renderer::TrivialDecorator;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScanError;

/// Raw fields of one parsed RSS item or Atom entry, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub guid: Option<String>,
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub dc_content: Option<String>,
    pub content: Option<String>,
    pub content_encoded: Option<String>,
    pub summary: Option<String>,
    pub content_snippet: Option<String>,
}

/// Normalized view of a feed entry, used for rendering and history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub content: String,
    pub summary: String,
    pub content_snippet: String,
    pub pub_date: Option<DateTime<Utc>>,
}

impl FeedEntry {
    pub fn from_rss_item(item: &rss::Item) -> Self {
        let published_at = item
            .pub_date()
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
            .map(|dt| dt.with_timezone(&Utc));

        // Undeclared `dc:` prefixes stay in the raw extension map.
        let dc_content = item
            .extensions()
            .get("dc")
            .and_then(|ext| ext.get("content"))
            .and_then(|values| values.first())
            .and_then(|value| value.value())
            .map(ToOwned::to_owned);

        let content = item.description().map(ToOwned::to_owned);
        let content_snippet = content.as_deref().map(plain_text);

        Self {
            guid: item.guid().map(|guid| guid.value().to_owned()),
            title: item.title().unwrap_or_default().trim().to_owned(),
            link: item.link().unwrap_or_default().to_owned(),
            published_at,
            dc_content,
            content,
            content_encoded: item.content().map(ToOwned::to_owned),
            summary: None,
            content_snippet,
        }
    }

    pub fn from_atom_entry(entry: &atom_syndication::Entry) -> Self {
        let link = entry
            .links()
            .iter()
            .find(|link| link.rel() == "alternate")
            .or_else(|| entry.links().first())
            .map(|link| link.href().to_owned())
            .unwrap_or_default();

        let published_at = entry
            .published()
            .unwrap_or_else(|| entry.updated())
            .with_timezone(&Utc);

        let content = entry
            .content()
            .and_then(|content| content.value())
            .map(ToOwned::to_owned);
        let content_snippet = content.as_deref().map(plain_text);
        let id = entry.id().trim();

        Self {
            guid: (!id.is_empty()).then(|| id.to_owned()),
            title: entry.title().value.trim().to_owned(),
            link,
            published_at: Some(published_at),
            dc_content: None,
            content,
            content_encoded: None,
            summary: entry.summary().map(|text| text.value.clone()),
            content_snippet,
        }
    }

    /// Text scanned for keywords: title, dc:content, content, summary, snippet
    /// and content:encoded, space separated and lowercased.
    pub fn searchable_text(&self) -> String {
        [
            Some(self.title.as_str()),
            self.dc_content.as_deref(),
            self.content.as_deref(),
            self.summary.as_deref(),
            self.content_snippet.as_deref(),
            self.content_encoded.as_deref(),
        ]
        .into_iter()
        .map(|field| field.unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
    }

    pub fn to_item(&self) -> FeedItem {
        let content = first_non_empty(&[
            self.dc_content.as_deref(),
            self.content_encoded.as_deref(),
            self.content.as_deref(),
        ]);
        let description = first_non_empty(&[
            self.dc_content.as_deref(),
            self.content_encoded.as_deref(),
            self.content.as_deref(),
            self.summary.as_deref(),
            self.content_snippet.as_deref(),
        ]);

        FeedItem {
            title: self.title.clone(),
            link: self.link.clone(),
            description,
            content,
            summary: self.summary.clone().unwrap_or_default(),
            content_snippet: self.content_snippet.clone().unwrap_or_default(),
            pub_date: self.published_at,
        }
    }
}

fn first_non_empty(candidates: &[Option<&str>]) -> String {
    candidates
        .iter()
        .flatten()
        .find(|value| !value.is_empty())
        .map(|value| (*value).to_owned())
        .unwrap_or_default()
}

/// Minimal HTML to text extraction with collapsed whitespace.
pub fn plain_text(html: &str) -> String {
    let text = html2text::from_read_with_decorator(html.as_bytes(), 200, TrivialDecorator::new());
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses an RSS 2.0 document, falling back to Atom.
pub fn parse_entries(body: &[u8]) -> Result<Vec<FeedEntry>, ScanError> {
    match rss::Channel::read_from(body) {
        Ok(channel) => {
            let dc_contents = dc_contents(body);
            let entries = channel
                .items()
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let mut entry = FeedEntry::from_rss_item(item);
                    if entry.dc_content.is_none() {
                        entry.dc_content = dc_contents.get(index).cloned().flatten();
                    }
                    entry
                })
                .collect();
            Ok(entries)
        }
        Err(rss_err) => match atom_syndication::Feed::read_from(body) {
            Ok(feed) => Ok(feed.entries().iter().map(FeedEntry::from_atom_entry).collect()),
            // A non-<rss> root means the document was meant to be Atom.
            Err(atom_err) if matches!(rss_err, rss::Error::InvalidStartTag) => {
                Err(ScanError::from(atom_err))
            }
            Err(atom_err) => {
                debug!(error = %atom_err, "atom fallback failed");
                Err(ScanError::from(rss_err))
            }
        },
    }
}

/// `dc:content` of every `<item>`, in document order.
///
/// A declared Dublin Core namespace makes `rss` move the element into
/// `DublinCoreExtension`, which has no slot for it, so it is read from the raw
/// document instead.
fn dc_contents(body: &[u8]) -> Vec<Option<String>> {
    let mut out: Vec<Option<String>> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_item = false;
    let mut capture: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"item" {
                    in_item = true;
                    out.push(None);
                } else if in_item && e.name().as_ref() == b"dc:content" {
                    capture = Some(String::new());
                }
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"item" {
                    out.push(None);
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(value) = capture.as_mut() {
                    value.push_str(text.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(value) = capture.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"item" {
                    in_item = false;
                    capture = None;
                } else if e.name().as_ref() == b"dc:content" {
                    if let (Some(value), Some(slot)) = (capture.take(), out.last_mut()) {
                        if slot.is_none() && !value.is_empty() {
                            *slot = Some(value);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, "dc:content scan stopped early");
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    out
}
