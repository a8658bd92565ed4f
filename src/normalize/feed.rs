//! arXiv Atom feed normalizer.
//!
//! Walks the document with the quick-xml event reader. Elements are matched by
//! local name, so `<arxiv:doi>` and `<doi>` are treated alike.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::NormalizeError;
use crate::models::{PaperRecord, PaperRecordBuilder};

/// Entry child whose text is being collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    Updated,
    AuthorName,
    Doi,
    JournalRef,
}

/// Fields gathered for one `<entry>`
#[derive(Debug, Default)]
struct EntryState {
    id: String,
    title: String,
    summary: String,
    published: String,
    updated: String,
    authors: Vec<String>,
    author_name: String,
    categories: Vec<String>,
    doi: String,
    journal_ref: String,
    pdf_url: Option<String>,
    in_author: bool,
}

impl EntryState {
    fn text_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::Summary => &mut self.summary,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::AuthorName => &mut self.author_name,
            Field::Doi => &mut self.doi,
            Field::JournalRef => &mut self.journal_ref,
        }
    }

    /// Record a `<link>` element; the first PDF link wins
    fn add_link(&mut self, e: &BytesStart<'_>) {
        if self.pdf_url.is_some() {
            return;
        }

        let is_pdf = get_attr(e, "title").as_deref() == Some("pdf")
            || get_attr(e, "type").as_deref() == Some("application/pdf");
        if is_pdf {
            self.pdf_url = get_attr(e, "href").filter(|href| !href.trim().is_empty());
        }
    }

    fn add_category(&mut self, e: &BytesStart<'_>) {
        if let Some(term) = get_attr(e, "term").filter(|t| !t.trim().is_empty()) {
            self.categories.push(term);
        }
    }

    /// First required field that is missing or blank
    fn missing_field(&self) -> Option<&'static str> {
        [
            ("id", &self.id),
            ("title", &self.title),
            ("summary", &self.summary),
            ("published", &self.published),
            ("updated", &self.updated),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }

    fn into_record(self) -> PaperRecord {
        let builder = PaperRecordBuilder::new(self.id.trim(), collapse_whitespace(&self.title))
            .authors(self.authors)
            .summary(self.summary.trim())
            .published_date(&self.published)
            .updated_date(&self.updated)
            .categories(self.categories)
            .doi(&self.doi)
            .journal_ref(collapse_whitespace(&self.journal_ref));

        match self.pdf_url {
            Some(url) => builder.pdf_url(url).build(),
            None => builder.build(),
        }
    }
}

/// Parse an Atom feed into records, in document order.
///
/// Entries lacking a required field are dropped with a warning. A document
/// that is not a well-formed `<feed>` fails the whole call.
pub fn parse_feed(body: &[u8]) -> Result<Vec<PaperRecord>, NormalizeError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut records = Vec::new();

    let mut depth: usize = 0;
    let mut saw_feed = false;
    let mut entry: Option<EntryState> = None;
    let mut field: Option<Field> = None;
    let mut dropped = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                let local = e.local_name();
                let name = local.as_ref();

                if depth == 1 {
                    if name != b"feed" {
                        return Err(NormalizeError::Parse(format!(
                            "unexpected root element <{}>",
                            String::from_utf8_lossy(name)
                        )));
                    }
                    saw_feed = true;
                } else if name == b"entry" {
                    entry = Some(EntryState::default());
                    field = None;
                } else if let Some(current) = entry.as_mut() {
                    field = match name {
                        b"id" => Some(Field::Id),
                        b"title" => Some(Field::Title),
                        b"summary" => Some(Field::Summary),
                        b"published" => Some(Field::Published),
                        b"updated" => Some(Field::Updated),
                        b"doi" => Some(Field::Doi),
                        b"journal_ref" => Some(Field::JournalRef),
                        b"name" if current.in_author => Some(Field::AuthorName),
                        b"author" => {
                            current.in_author = true;
                            current.author_name.clear();
                            None
                        }
                        b"link" => {
                            current.add_link(e);
                            None
                        }
                        b"category" => {
                            current.add_category(e);
                            None
                        }
                        _ => None,
                    };
                }
            }
            Ok(Event::Empty(ref e)) => {
                if depth == 0 {
                    if e.local_name().as_ref() != b"feed" {
                        return Err(NormalizeError::Parse(format!(
                            "unexpected root element <{}>",
                            String::from_utf8_lossy(e.local_name().as_ref())
                        )));
                    }
                    saw_feed = true;
                }
                if let Some(current) = entry.as_mut() {
                    match e.local_name().as_ref() {
                        b"link" => current.add_link(e),
                        b"category" => current.add_category(e),
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(current), Some(f)) = (entry.as_mut(), field) {
                    let text = e.unescape()?;
                    current.text_mut(f).push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let (Some(current), Some(f)) = (entry.as_mut(), field) {
                    current.text_mut(f).push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(ref e)) => {
                depth = depth.saturating_sub(1);
                field = None;

                match e.local_name().as_ref() {
                    b"entry" => {
                        if let Some(finished) = entry.take() {
                            match finished.missing_field() {
                                Some(missing) => {
                                    dropped += 1;
                                    tracing::warn!(
                                        id = %finished.id.trim(),
                                        missing,
                                        "Dropping feed entry without required field"
                                    );
                                }
                                None => records.push(finished.into_record()),
                            }
                        }
                    }
                    b"author" => {
                        if let Some(current) = entry.as_mut() {
                            let name = collapse_whitespace(&current.author_name);
                            if !name.is_empty() {
                                current.authors.push(name);
                            }
                            current.author_name.clear();
                            current.in_author = false;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(NormalizeError::Parse(format!(
                    "XML parsing error at position {}: {}",
                    reader.error_position(),
                    e
                )));
            }
        }
        buf.clear();
    }

    if !saw_feed {
        return Err(NormalizeError::Parse("missing <feed> root element".to_string()));
    }
    if depth != 0 {
        return Err(NormalizeError::Parse("truncated feed document".to_string()));
    }

    tracing::debug!(records = records.len(), dropped, "Parsed Atom feed");
    Ok(records)
}

/// Get attribute value from a BytesStart element
fn get_attr(e: &BytesStart<'_>, attr_name: &str) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == attr_name.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: Option<&str>) -> String {
        let title = title
            .map(|t| format!("<title>{t}</title>"))
            .unwrap_or_default();
        format!(
            r#"<entry>
    <id>http://arxiv.org/abs/{id}</id>
    <updated>2023-02-01T08:30:00Z</updated>
    <published>2023-01-15T10:00:00Z</published>
    {title}
    <summary>  An abstract about {id}.
    </summary>
    <author><name>Alice Example</name></author>
    <author><name>Bob Example</name><arxiv:affiliation>Somewhere</arxiv:affiliation></author>
    <arxiv:doi>10.1000/{id}</arxiv:doi>
    <link href="http://arxiv.org/abs/{id}" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/{id}" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="stat.ML" scheme="http://arxiv.org/schemas/atom"/>
  </entry>"#
        )
    }

    fn feed(entries: &[String]) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query</title>
  <id>http://arxiv.org/api/query</id>
  <updated>2023-02-02T00:00:00-05:00</updated>
  {}
</feed>"#,
            entries.join("\n")
        )
    }

    #[test]
    fn test_parse_three_entries_in_order() {
        let xml = feed(&[
            entry("2301.00001v1", Some("First")),
            entry("2301.00002v1", Some("Second")),
            entry("2301.00003v1", Some("Third")),
        ]);

        let records = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].title, "First");
        assert_eq!(records[2].title, "Third");

        let first = &records[0];
        assert_eq!(first.id, "http://arxiv.org/abs/2301.00001v1");
        assert_eq!(first.authors, vec!["Alice Example", "Bob Example"]);
        assert_eq!(first.summary, "An abstract about 2301.00001v1.");
        assert_eq!(first.published_date, "2023-01-15");
        assert_eq!(first.updated_date, "2023-02-01");
        assert_eq!(first.categories, vec!["cs.LG", "stat.ML"]);
        assert_eq!(first.doi, "10.1000/2301.00001v1");
        assert_eq!(first.journal_ref, "N/A");
        assert_eq!(
            first.pdf_url.as_deref(),
            Some("http://arxiv.org/pdf/2301.00001v1")
        );
    }

    #[test]
    fn test_entry_without_title_is_dropped() {
        let xml = feed(&[
            entry("2301.00001v1", Some("Kept")),
            entry("2301.00002v1", None),
            entry("2301.00003v1", Some("Also kept")),
        ]);

        let records = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Kept");
        assert_eq!(records[1].title, "Also kept");
    }

    #[test]
    fn test_missing_pdf_link_is_not_an_error() {
        let xml = feed(&[r#"<entry>
    <id>http://arxiv.org/abs/2301.00009v1</id>
    <updated>2023-02-01T08:30:00Z</updated>
    <published>2023-01-15T10:00:00Z</published>
    <title>No
      PDF here</title>
    <summary>Text</summary>
    <arxiv:journal_ref>Phys. Rev. 1 (2023)</arxiv:journal_ref>
  </entry>"#
            .to_string()]);

        let records = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "No PDF here");
        assert!(records[0].pdf_url.is_none());
        assert!(records[0].authors.is_empty());
        assert_eq!(records[0].doi, "N/A");
        assert_eq!(records[0].journal_ref, "Phys. Rev. 1 (2023)");
    }

    #[test]
    fn test_empty_feed() {
        let records = parse_feed(feed(&[]).as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_self_closing_feed_is_empty() {
        let records =
            parse_feed(br#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"/>"#)
                .unwrap();
        assert!(records.is_empty());

        assert!(matches!(
            parse_feed(br#"<?xml version="1.0"?><html/>"#),
            Err(NormalizeError::Parse(_))
        ));
    }

    #[test]
    fn test_unparsable_document() {
        assert!(matches!(
            parse_feed(b"<feed><entry></feed>"),
            Err(NormalizeError::Parse(_))
        ));
        assert!(matches!(
            parse_feed(b"{\"success\": true}"),
            Err(NormalizeError::Parse(_))
        ));
        assert!(matches!(parse_feed(b""), Err(NormalizeError::Parse(_))));
    }

    #[test]
    fn test_truncated_document() {
        let xml = feed(&[entry("2301.00001v1", Some("First"))]);
        let cut = &xml.as_bytes()[..xml.len() / 2];
        assert!(parse_feed(cut).is_err());
    }

    #[test]
    fn test_wrong_root() {
        assert!(matches!(
            parse_feed(b"<html><body>Service unavailable</body></html>"),
            Err(NormalizeError::Parse(_))
        ));
    }
}
