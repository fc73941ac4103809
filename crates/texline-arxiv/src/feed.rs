//! arXiv query API (Atom) parser using quick-xml
//!
//! Only the `<entry>` elements matter. The feed-level `<id>`/`<title>` and
//! OpenSearch counters are skipped.

use chrono::{DateTime, FixedOffset};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use texline_core::FetchError;

use crate::id::parse_version_suffix;

/// One search result as returned by the query API
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    /// Abstract URL, e.g. `http://arxiv.org/abs/2411.00222v2`
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub published: DateTime<FixedOffset>,
    pub updated: DateTime<FixedOffset>,
    pub journal_ref: Option<String>,
    pub pdf_url: Option<String>,
}

impl FeedEntry {
    /// Highest revision, read off the entry id. No suffix means one revision.
    pub fn max_version(&self) -> u32 {
        parse_version_suffix(&self.id).unwrap_or(1)
    }

    /// Source bundle URL derived from the PDF link, when the entry has one
    pub fn source_url(&self) -> Option<String> {
        self.pdf_url
            .as_deref()
            .filter(|url| url.contains("/pdf/"))
            .map(|url| url.replacen("/pdf/", "/src/", 1))
    }
}

/// Entry fields as they appear in the XML, before validation
#[derive(Debug, Default)]
struct RawEntry {
    id: Option<String>,
    title: Option<String>,
    authors: Vec<String>,
    published: Option<String>,
    updated: Option<String>,
    journal_ref: Option<String>,
    pdf_url: Option<String>,
}

/// Parse a search response for `query_id` into its first entry.
///
/// No entry, or an entry whose id points at `api/errors` (how the API
/// reports a malformed or unknown id), is [`FetchError::NotFound`].
pub fn parse_search_response(xml: &str, query_id: &str) -> Result<FeedEntry, FetchError> {
    let raw = parse_entries(xml)
        .map_err(|e| FetchError::Malformed(format!("feed for {query_id}: {e}")))?
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::NotFound(query_id.to_string()))?;

    let id = raw
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| FetchError::Malformed(format!("entry for {query_id} has no id")))?;
    if id.contains("api/errors") {
        log::debug!("{query_id}: API error entry {id}");
        return Err(FetchError::NotFound(query_id.to_string()));
    }

    let published = parse_timestamp(raw.published.as_deref(), "published", query_id)?;
    let updated = parse_timestamp(raw.updated.as_deref(), "updated", query_id)?;

    Ok(FeedEntry {
        id,
        title: normalize_whitespace(raw.title.as_deref().unwrap_or_default()),
        authors: raw.authors,
        published,
        updated,
        journal_ref: raw
            .journal_ref
            .map(|s| normalize_whitespace(&s))
            .filter(|s| !s.is_empty()),
        pdf_url: raw.pdf_url,
    })
}

fn parse_timestamp(
    value: Option<&str>,
    field: &str,
    query_id: &str,
) -> Result<DateTime<FixedOffset>, FetchError> {
    let value =
        value.ok_or_else(|| FetchError::Malformed(format!("entry for {query_id} has no <{field}>")))?;
    DateTime::parse_from_rfc3339(value.trim())
        .map_err(|e| FetchError::Malformed(format!("bad <{field}> {value:?} for {query_id}: {e}")))
}

/// Collapse runs of whitespace (titles wrap across lines in the feed)
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_entries(xml: &str) -> Result<Vec<RawEntry>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"entry" => {
                entries.push(parse_entry(&mut reader)?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn parse_entry(reader: &mut Reader<&[u8]>) -> Result<RawEntry, quick_xml::Error> {
    let mut entry = RawEntry::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"id" => entry.id = Some(read_text(reader, b"id")?),
                b"title" => entry.title = Some(read_text(reader, b"title")?),
                b"published" => entry.published = Some(read_text(reader, b"published")?),
                b"updated" => entry.updated = Some(read_text(reader, b"updated")?),
                b"journal_ref" => entry.journal_ref = Some(read_text(reader, b"journal_ref")?),
                b"author" => {
                    if let Some(name) = parse_author(reader)? {
                        entry.authors.push(name);
                    }
                }
                b"link" => take_pdf_link(&e, &mut entry)?,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"link" => {
                take_pdf_link(&e, &mut entry)?;
            }
            Event::End(e) if e.local_name().as_ref() == b"entry" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(entry)
}

fn parse_author(reader: &mut Reader<&[u8]>) -> Result<Option<String>, quick_xml::Error> {
    let mut name = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"name" => {
                let text = normalize_whitespace(&read_text(reader, b"name")?);
                if !text.is_empty() {
                    name = Some(text);
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"author" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(name)
}

/// `<link title="pdf" href="..."/>` or `<link type="application/pdf" .../>`
fn take_pdf_link(e: &BytesStart, entry: &mut RawEntry) -> Result<(), quick_xml::Error> {
    let mut href = None;
    let mut is_pdf = false;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value()?;
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value.into_owned()),
            b"title" if value == "pdf" => is_pdf = true,
            b"type" if value == "application/pdf" => is_pdf = true,
            _ => {}
        }
    }
    if is_pdf && entry.pdf_url.is_none() {
        entry.pdf_url = href;
    }
    Ok(())
}

/// Read text content until the closing tag, concatenating text and CDATA
fn read_text(reader: &mut Reader<&[u8]>, end_tag: &[u8]) -> Result<String, quick_xml::Error> {
    let mut text = String::new();
    let mut buf = Vec::new();
    let mut depth = 0u32;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::Start(e) if e.local_name().as_ref() == end_tag => depth += 1,
            Event::End(e) if e.local_name().as_ref() == end_tag => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <id>https://arxiv.org/api/abc</id>
  <title>arXiv Query: id_list=2411.00222</title>
  <updated>2024-11-10T00:00:00-05:00</updated>
  <opensearch:totalResults xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">1</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/2411.00222v2</id>
    <updated>2024-11-06T12:30:00Z</updated>
    <published>2024-10-31T23:59:01Z</published>
    <title>Scaling Laws for
      Source   Archives</title>
    <summary>We study things &amp; stuff.</summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan  Turing</name><arxiv:affiliation>Bletchley</arxiv:affiliation></author>
    <arxiv:journal_ref>J. Crawl. 12 (2025) 1-10</arxiv:journal_ref>
    <link href="http://arxiv.org/abs/2411.00222v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2411.00222v2" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn parses_entry_fields() {
        let entry = parse_search_response(FEED, "2411.00222").unwrap();
        assert_eq!(entry.id, "http://arxiv.org/abs/2411.00222v2");
        assert_eq!(entry.title, "Scaling Laws for Source Archives");
        assert_eq!(entry.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(entry.journal_ref.as_deref(), Some("J. Crawl. 12 (2025) 1-10"));
        assert_eq!(entry.published.date_naive().to_string(), "2024-10-31");
        assert_eq!(entry.updated.date_naive().to_string(), "2024-11-06");
        assert_eq!(entry.max_version(), 2);
    }

    #[test]
    fn source_url_from_pdf_link() {
        let entry = parse_search_response(FEED, "2411.00222").unwrap();
        assert_eq!(entry.pdf_url.as_deref(), Some("http://arxiv.org/pdf/2411.00222v2"));
        assert_eq!(entry.source_url().as_deref(), Some("http://arxiv.org/src/2411.00222v2"));
    }

    #[test]
    fn empty_feed_is_not_found() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>q</title><id>x</id></feed>"#;
        let err = parse_search_response(xml, "2411.99999").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn api_error_entry_is_not_found() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <id>http://arxiv.org/api/errors#incorrect_id_format_for_bogus</id>
            <title>Error</title>
            <summary>incorrect id format for bogus</summary>
            <updated>2024-11-10T00:00:00-05:00</updated>
          </entry></feed>"#;
        let err = parse_search_response(xml, "bogus").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn missing_dates_are_malformed() {
        let xml = r#"<feed><entry><id>http://arxiv.org/abs/2411.00222v1</id><title>t</title></entry></feed>"#;
        let err = parse_search_response(xml, "2411.00222").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn truncated_xml_is_malformed() {
        let xml = r#"<feed><entry><id>http://arxiv.org/abs/2411.00222v1</id><title>t</ti"#;
        assert!(parse_search_response(xml, "2411.00222").is_err());
    }

    #[test]
    fn unsuffixed_id_means_one_version() {
        let xml = r#"<feed><entry>
            <id>http://arxiv.org/abs/math/0610595</id>
            <published>2006-10-19T00:00:00Z</published>
            <updated>2006-10-19T00:00:00Z</updated>
            <title>Old paper</title>
            <arxiv:journal_ref xmlns:arxiv="http://arxiv.org/schemas/atom">   </arxiv:journal_ref>
          </entry></feed>"#;
        let entry = parse_search_response(xml, "math/0610595").unwrap();
        assert_eq!(entry.max_version(), 1);
        assert_eq!(entry.journal_ref, None);
        assert!(entry.authors.is_empty());
        assert_eq!(entry.source_url(), None);
    }

    #[test]
    fn normalizes_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\t b  c "), "a b c");
        assert_eq!(normalize_whitespace(""), "");
    }
}
