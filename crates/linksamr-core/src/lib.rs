//! Batch client core for the Links AMR (Article Match Retrieval) service.
//!
//! Provides the request/response pipeline: fixed-size batching with sentinel
//! padding, XML request construction for the xrpc41 protocol, a per-minute
//! record throttle, an HTTPS transport, and a namespace-tolerant response
//! parser. Batches are dispatched strictly one at a time — the throttle's
//! window accounting is measured against a single wall-clock baseline.

pub mod batch;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod throttle;
pub mod transport;

use thiserror::Error;

pub use batch::{Slot, group};
pub use pipeline::{LookupProgress, Pipeline};
pub use request::{Credentials, LookupKind, RequestBuilder};
pub use response::ResultRecord;
pub use throttle::Throttle;
pub use transport::{AMR_ENDPOINT, HttpTransport, Transport};

/// XML namespace of the xrpc41 protocol.
pub const XRPC_NS: &str = "http://www.isinet.com/xrpc41";

/// Records per request; the service accepts at most 50 lookups per call.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default records-per-minute cap enforced by the throttle.
pub const DEFAULT_THROTTLE_CAP: u32 = 300;

#[derive(Error, Debug)]
pub enum AmrError {
    #[error("batch size must be at least 1")]
    InvalidBatchSize,
    #[error("failed to render request XML: {0}")]
    Render(String),
    #[error("AMR endpoint returned HTTP {status}")]
    Http { status: reqwest::StatusCode },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed AMR response: {source}")]
    Protocol {
        source: quick_xml::Error,
        /// Raw response body, kept for diagnosis of protocol mismatches.
        body: String,
    },
}

// The only I/O the core performs itself is writing request XML into a buffer.
impl From<std::io::Error> for AmrError {
    fn from(e: std::io::Error) -> Self {
        AmrError::Render(e.to_string())
    }
}

// Writer-side quick-xml failures are render errors; reader-side failures are
// wrapped in `Protocol` explicitly so the raw body travels with them.
impl From<quick_xml::Error> for AmrError {
    fn from(e: quick_xml::Error) -> Self {
        AmrError::Render(e.to_string())
    }
}

/// One input row: an ordered mapping of field name to value.
///
/// Field names are caller-defined; the CSV reader normalizes them to
/// lowercase at ingestion. Insertion order is preserved so rendered
/// requests are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupRecord {
    fields: Vec<(String, String)>,
}

impl LookupRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(field, value)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut record = Self::new();
        for (name, value) in pairs {
            record.insert(name, value);
        }
        record
    }

    /// Insert a field, replacing any existing value under the same name.
    pub fn insert(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }

    /// Exact-match field lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
