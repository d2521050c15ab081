use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{IngestError, IngestResult};

/// Article links from an RSS 2.0 (`<item><link>`) or Atom (`<entry><link href>`) document.
///
/// Channel-level links are ignored; only `http(s)` links are kept, in document order.
pub fn parse_feed_links(xml: &str) -> IngestResult<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut links = Vec::new();
    let mut in_item = false;
    let mut in_link = false;
    let mut item_has_link = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| IngestError::Malformed(format!("feed XML: {e}")))?;

        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    in_item = true;
                    item_has_link = false;
                }
                b"link" if in_item && !item_has_link => {
                    if let Some(href) = atom_href(&e) {
                        item_has_link |= push_link(&mut links, &href);
                    } else {
                        in_link = true;
                    }
                }
                _ => {}
            },
            Event::Empty(e) if in_item && !item_has_link && e.local_name().as_ref() == b"link" => {
                if let Some(href) = atom_href(&e) {
                    item_has_link |= push_link(&mut links, &href);
                }
            }
            Event::Text(t) if in_link => {
                let text = t
                    .unescape()
                    .map_err(|e| IngestError::Malformed(format!("feed text: {e}")))?;
                item_has_link |= push_link(&mut links, &text);
            }
            Event::CData(t) if in_link => {
                let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                item_has_link |= push_link(&mut links, &text);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"item" | b"entry" => in_item = false,
                b"link" => in_link = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(links)
}

/// `href` of an Atom link that points at the article (no rel, or rel="alternate").
fn atom_href(e: &BytesStart<'_>) -> Option<String> {
    let rel = e
        .try_get_attribute("rel")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()));
    if matches!(rel.as_deref(), Some(r) if r != "alternate") {
        return None;
    }
    e.try_get_attribute("href")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn push_link(links: &mut Vec<String>, raw: &str) -> bool {
    let link = raw.trim();
    if link.starts_with("http") {
        links.push(link.to_string());
        true
    } else {
        false
    }
}
