//! Parsing of xrpc41 response documents into keyed records.
//!
//! Responses nest `fn → map → map[name=KEY] → map[name=WOS|JCR] → val`.
//! Parsing matches local names only, so namespace prefixes are tolerated.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::AmrError;

/// Fields returned for one batch item, keyed by lowercase-or-service field
/// name (`ut`, `doi`, `timesCited`, ...). Only non-empty values are kept.
pub type ResultRecord = HashMap<String, String>;

fn name_attr(e: &BytesStart<'_>) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"name" {
            return Some(String::from_utf8_lossy(&attr.value).into_owned());
        }
    }
    None
}

/// Parse a response body into a mapping from batch key to result record.
///
/// A well-formed response with zero citation maps is a service-level
/// anomaly, not an error: it is logged with the raw body and an empty
/// mapping is returned, since an all-miss batch is a normal outcome.
/// Malformed XML is fatal — it indicates a protocol mismatch.
pub fn parse(body: &str) -> Result<HashMap<String, ResultRecord>, AmrError> {
    let mut reader = Reader::from_str(body);
    let mut buf = Vec::new();

    let mut out: HashMap<String, ResultRecord> = HashMap::new();
    let mut in_fn = false;
    let mut map_depth = 0usize;
    let mut current_key: Option<String> = None;
    let mut current_record = ResultRecord::new();
    let mut reading_val: Option<String> = None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"fn" => in_fn = true,
                b"map" if in_fn => {
                    map_depth += 1;
                    if map_depth == 2 {
                        current_key = name_attr(e);
                        current_record = ResultRecord::new();
                    }
                }
                b"val" if in_fn && map_depth >= 3 => {
                    reading_val = name_attr(e);
                    text_buf.clear();
                }
                _ => {}
            },

            Ok(Event::Text(ref e)) => {
                if reading_val.is_some()
                    && let Ok(text) = e.unescape()
                {
                    text_buf.push_str(&text);
                }
            }

            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"fn" => in_fn = false,
                b"map" if in_fn && map_depth > 0 => {
                    if map_depth == 2
                        && let Some(key) = current_key.take()
                    {
                        out.insert(key, std::mem::take(&mut current_record));
                    }
                    map_depth -= 1;
                }
                b"val" => {
                    if let Some(name) = reading_val.take() {
                        let text = text_buf.trim();
                        if !text.is_empty() {
                            current_record.insert(name, text.to_string());
                        }
                    }
                }
                _ => {}
            },

            Ok(Event::Eof) => break,
            Err(source) => {
                return Err(AmrError::Protocol {
                    source,
                    body: body.to_string(),
                });
            }
            _ => {}
        }
        buf.clear();
    }

    if out.is_empty() {
        tracing::warn!(%body, "AMR response contained no citation records");
    }
    Ok(out)
}
