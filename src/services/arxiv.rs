// src/services/arxiv.rs

//! arXiv Atom API client.
//!
//! The upstream collaborator is reached through [`PaperSource`] so the fetch
//! stage can be driven by a stub in tests. [`ArxivSource`] is the real
//! implementation: one HTTP GET per call, Atom XML parsed into
//! [`RawEntry`]s.

use async_trait::async_trait;
use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{RawEntry, SourceConfig};
use crate::utils::http;

/// One page request against the upstream feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub category: String,
    /// Lower submission-date bound, inclusive; `None` leaves it open
    pub since: Option<NaiveDate>,
    /// Upper submission-date bound, inclusive
    pub until: NaiveDate,
    pub start: usize,
    pub max_results: usize,
}

impl FeedQuery {
    /// The `search_query` parameter understood by the arXiv API.
    pub fn search_query(&self) -> String {
        match self.since {
            Some(since) => format!(
                "cat:{} AND submittedDate:[{}0000 TO {}2359]",
                self.category,
                since.format("%Y%m%d"),
                self.until.format("%Y%m%d")
            ),
            None => format!("cat:{}", self.category),
        }
    }
}

/// Upstream supplier of raw feed entries.
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Fetch one page of entries, newest submissions first.
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawEntry>>;
}

/// HTTP client for the arXiv query API.
#[derive(Clone)]
pub struct ArxivSource {
    client: Client,
    endpoint: Url,
}

impl ArxivSource {
    /// Create a source from configuration. Fails without a contact address.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_client(config)?,
            endpoint: Url::parse(&config.base_url)?,
        })
    }
}

#[async_trait]
impl PaperSource for ArxivSource {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawEntry>> {
        let search_query = query.search_query();
        log::debug!(
            "GET {} search_query={:?} start={} max_results={}",
            self.endpoint,
            search_query,
            query.start,
            query.max_results
        );

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("search_query", search_query.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .query(&[("start", query.start), ("max_results", query.max_results)])
            .header(
                ACCEPT,
                "application/atom+xml, application/xml;q=0.9, text/xml;q=0.8",
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;

        if !(content_type.contains("xml") || content_type.contains("atom")) {
            let preview: String = body.trim().chars().take(200).collect();
            return Err(AppError::feed(format!(
                "unexpected content-type {content_type:?}: {preview}"
            )));
        }

        parse_atom(&body)
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    Updated,
    AuthorName,
}

/// Parse an Atom document into raw entries.
///
/// Namespaces are ignored (`arxiv:primary_category` reads as
/// `primary_category`). An arXiv error document is reported as a feed error.
pub fn parse_atom(xml: &str) -> Result<Vec<RawEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<RawEntry> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"entry" => current = Some(RawEntry::default()),
                b"author" if current.is_some() => in_author = true,
                name => {
                    if let Some(entry) = current.as_mut() {
                        read_attributes(entry, &e)?;
                        field = match name {
                            b"id" => Some(Field::Id),
                            b"title" => Some(Field::Title),
                            b"summary" => Some(Field::Summary),
                            b"published" => Some(Field::Published),
                            b"updated" => Some(Field::Updated),
                            b"name" if in_author => Some(Field::AuthorName),
                            _ => None,
                        };
                        text.clear();
                    }
                }
            },
            Event::Empty(e) => {
                if let Some(entry) = current.as_mut() {
                    read_attributes(entry, &e)?;
                }
            }
            Event::Text(t) => {
                if field.is_some() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(entry) = current.take() {
                        check_api_error(&entry)?;
                        entries.push(entry);
                    }
                    field = None;
                }
                b"author" => in_author = false,
                _ => {
                    if let (Some(f), Some(entry)) = (field.take(), current.as_mut()) {
                        let value = std::mem::take(&mut text);
                        match f {
                            Field::Id => entry.id = Some(value),
                            Field::Title => entry.title = Some(value),
                            Field::Summary => entry.summary = Some(value),
                            Field::Published => entry.published = Some(value),
                            Field::Updated => entry.updated = Some(value),
                            Field::AuthorName => entry.authors.push(value),
                        }
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// Pick up `<link>` and `<category>` attributes.
fn read_attributes(entry: &mut RawEntry, element: &BytesStart<'_>) -> Result<()> {
    match element.local_name().as_ref() {
        b"link" => {
            let mut rel = None;
            let mut href = None;
            for attr in element.attributes().flatten() {
                let value = attr.unescape_value()?.into_owned();
                match attr.key.local_name().as_ref() {
                    b"rel" => rel = Some(value),
                    b"href" => href = Some(value),
                    _ => {}
                }
            }
            // Atom: a link without rel is an alternate link
            let alternate = rel.as_deref().is_none_or(|r| r == "alternate");
            if alternate && entry.link.is_none() {
                entry.link = href;
            }
        }
        b"category" => {
            for attr in element.attributes().flatten() {
                if attr.key.local_name().as_ref() == b"term" {
                    entry.categories.push(attr.unescape_value()?.into_owned());
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn check_api_error(entry: &RawEntry) -> Result<()> {
    let is_error = entry
        .id
        .as_deref()
        .is_some_and(|id| id.contains("/api/errors"));
    if is_error {
        let message = entry.summary.as_deref().unwrap_or("unspecified API error");
        return Err(AppError::feed(format!("arXiv API error: {message}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=cat:math.AG</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2410.01234v2</id>
    <updated>2026-10-14T10:00:00Z</updated>
    <published>2026-10-13T17:59:59Z</published>
    <title>Moduli of curves &amp; their
      compactifications</title>
    <summary>  We prove that the moduli space is proper.
    </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Emmy Noether</name><arxiv:affiliation>Göttingen</arxiv:affiliation></author>
    <link href="http://arxiv.org/abs/2410.01234v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2410.01234v2" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="math.AG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="math.AG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="14H10" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2410.05678v1</id>
    <published>2026-10-12T08:00:00Z</published>
    <title><![CDATA[Stacks <and> sheaves]]></title>
    <summary>No link here.</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_entries() {
        let entries = parse_atom(FEED).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.id.as_deref(), Some("http://arxiv.org/abs/2410.01234v2"));
        assert!(first.title.as_deref().unwrap().starts_with("Moduli of curves & their"));
        assert_eq!(
            first.summary.as_deref(),
            Some("We prove that the moduli space is proper.")
        );
        assert_eq!(first.authors, vec!["Ada Lovelace", "Emmy Noether"]);
        assert_eq!(first.link.as_deref(), Some("http://arxiv.org/abs/2410.01234v2"));
        assert_eq!(first.published.as_deref(), Some("2026-10-13T17:59:59Z"));
        assert_eq!(first.updated.as_deref(), Some("2026-10-14T10:00:00Z"));
        assert_eq!(first.categories, vec!["math.AG", "14H10"]);

        let second = &entries[1];
        assert_eq!(second.title.as_deref(), Some("Stacks <and> sheaves"));
        assert_eq!(second.link, None);
        assert!(second.authors.is_empty());
    }

    #[test]
    fn test_feed_without_entries() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        assert!(parse_atom(xml).unwrap().is_empty());
    }

    #[test]
    fn test_api_error_document() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <id>http://arxiv.org/api/errors#incorrect_id_format_for_1234</id>
            <title>Error</title>
            <summary>incorrect id format for 1234</summary>
          </entry>
        </feed>"#;
        assert!(matches!(parse_atom(xml), Err(AppError::Feed(_))));
    }

    #[test]
    fn test_search_query() {
        let query = FeedQuery {
            category: "math.AG".to_string(),
            since: NaiveDate::from_ymd_opt(2026, 10, 8),
            until: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            start: 0,
            max_results: 100,
        };
        assert_eq!(
            query.search_query(),
            "cat:math.AG AND submittedDate:[202610080000 TO 202610152359]"
        );

        let open = FeedQuery { since: None, ..query };
        assert_eq!(open.search_query(), "cat:math.AG");
    }
}
