//! XML request construction for the xrpc41 `LinksAMR.retrieve` call.
//!
//! A request is one envelope containing three maps inside the function
//! argument list: authentication, the declaration of which fields the
//! service should return, and the lookup data itself (one named map per
//! batch item). Text content is entity-escaped by the quick-xml writer.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::batch::Slot;
use crate::{AmrError, LookupRecord, XRPC_NS};

/// `src` attribute identifying this client to the service.
const APP_ID: &str = "app.id=linksamr";

/// Service credentials, loaded from the environment by the caller.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Which envelope variant to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// Identifier lookups: requests the `WOS` output field list.
    Ids,
    /// ISSN-based journal lookups: requests the `JCR` output field list.
    Journals,
}

impl LookupKind {
    /// Name of the return-fields list and the fields it declares.
    fn return_fields(self) -> (&'static str, &'static [&'static str]) {
        match self {
            LookupKind::Ids => ("WOS", &["sourceURL", "ut", "doi", "pmid", "timesCited"]),
            LookupKind::Journals => ("JCR", &["impactGraphURL", "issn"]),
        }
    }
}

/// Renders one batch into a protocol-conformant request document.
pub struct RequestBuilder {
    kind: LookupKind,
    credentials: Credentials,
}

impl RequestBuilder {
    pub fn new(kind: LookupKind, credentials: Credentials) -> Self {
        Self { kind, credentials }
    }

    /// Render `batch` into a request document.
    ///
    /// Each non-absent item becomes a `<map name="KEY">`; the key is the
    /// value of `key_field` (with an uppercase-spelling fallback) when
    /// present and non-empty, else the item's zero-based position within
    /// the batch. Sentinel slots are never serialized.
    pub fn build(&self, batch: &[Slot], key_field: &str) -> Result<String, AmrError> {
        let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);

        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut request = BytesStart::new("request");
        request.push_attribute(("xmlns", XRPC_NS));
        request.push_attribute(("src", APP_ID));
        w.write_event(Event::Start(request))?;

        let mut fn_el = BytesStart::new("fn");
        fn_el.push_attribute(("name", "LinksAMR.retrieve"));
        w.write_event(Event::Start(fn_el))?;
        w.write_event(Event::Start(BytesStart::new("list")))?;

        // Authentication
        w.write_event(Event::Comment(BytesText::new(" authentication ")))?;
        w.write_event(Event::Start(BytesStart::new("map")))?;
        write_val(&mut w, Some("username"), &self.credentials.username)?;
        write_val(&mut w, Some("password"), &self.credentials.password)?;
        w.write_event(Event::End(BytesEnd::new("map")))?;

        // What to return
        w.write_event(Event::Comment(BytesText::new(" what to return ")))?;
        w.write_event(Event::Start(BytesStart::new("map")))?;
        let (list_name, fields) = self.kind.return_fields();
        let mut field_list = BytesStart::new("list");
        field_list.push_attribute(("name", list_name));
        w.write_event(Event::Start(field_list))?;
        for field in fields {
            write_val(&mut w, None, field)?;
        }
        w.write_event(Event::End(BytesEnd::new("list")))?;
        w.write_event(Event::End(BytesEnd::new("map")))?;

        // Lookup data
        w.write_event(Event::Comment(BytesText::new(" lookup data ")))?;
        w.write_event(Event::Start(BytesStart::new("map")))?;
        for (position, slot) in batch.iter().enumerate() {
            let Some(record) = slot.as_record() else {
                continue;
            };
            match self.kind {
                LookupKind::Ids => self.write_item(&mut w, record, key_field, position)?,
                LookupKind::Journals => self.write_journal_item(&mut w, record, key_field)?,
            }
        }
        w.write_event(Event::End(BytesEnd::new("map")))?;

        w.write_event(Event::End(BytesEnd::new("list")))?;
        w.write_event(Event::End(BytesEnd::new("fn")))?;
        w.write_event(Event::End(BytesEnd::new("request")))?;

        String::from_utf8(w.into_inner()).map_err(|e| AmrError::Render(e.to_string()))
    }

    /// One identifier-lookup item: every field as a `<val>`, except the
    /// semicolon-separated `authors` field, which renders as a named list
    /// of individual author values.
    fn write_item(
        &self,
        w: &mut Writer<Vec<u8>>,
        record: &LookupRecord,
        key_field: &str,
        position: usize,
    ) -> Result<(), AmrError> {
        let key = batch_key(record, key_field, position);
        let mut item = BytesStart::new("map");
        item.push_attribute(("name", key.as_str()));
        w.write_event(Event::Start(item))?;

        for (name, value) in record.iter() {
            if name.eq_ignore_ascii_case("authors") {
                let mut authors = BytesStart::new("list");
                authors.push_attribute(("name", "authors"));
                w.write_event(Event::Start(authors))?;
                for author in value.split(';').map(str::trim).filter(|a| !a.is_empty()) {
                    write_val(w, None, author)?;
                }
                w.write_event(Event::End(BytesEnd::new("list")))?;
            } else {
                write_val(w, Some(&name.to_lowercase()), value.trim())?;
            }
        }

        w.write_event(Event::End(BytesEnd::new("map")))?;
        Ok(())
    }

    /// One journal-lookup item: exactly one `issn` val. Items without an
    /// ISSN are skipped entirely.
    fn write_journal_item(
        &self,
        w: &mut Writer<Vec<u8>>,
        record: &LookupRecord,
        key_field: &str,
    ) -> Result<(), AmrError> {
        let Some(issn) = record.get("issn").filter(|v| !v.is_empty()) else {
            return Ok(());
        };
        let Some(key) = record
            .get(key_field)
            .or_else(|| record.get(&key_field.to_uppercase()))
            .filter(|v| !v.is_empty())
        else {
            return Ok(());
        };

        let mut item = BytesStart::new("map");
        item.push_attribute(("name", key));
        w.write_event(Event::Start(item))?;
        write_val(w, Some("issn"), issn.trim())?;
        w.write_event(Event::End(BytesEnd::new("map")))?;
        Ok(())
    }
}

/// The identifier tagging one item within a batch's request map.
///
/// Falls back from the lowercase key field through its uppercase spelling
/// to the stringified zero-based batch position, which keeps keys unique
/// within a batch.
pub fn batch_key(record: &LookupRecord, key_field: &str, position: usize) -> String {
    record
        .get(key_field)
        .or_else(|| record.get(&key_field.to_uppercase()))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| position.to_string())
}

fn write_val(w: &mut Writer<Vec<u8>>, name: Option<&str>, text: &str) -> Result<(), AmrError> {
    let mut val = BytesStart::new("val");
    if let Some(name) = name {
        val.push_attribute(("name", name));
    }
    w.write_event(Event::Start(val))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new("val")))?;
    Ok(())
}
