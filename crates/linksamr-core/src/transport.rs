//! HTTPS transport for posting request documents to the AMR endpoint.

use reqwest::header::CONTENT_TYPE;

use crate::AmrError;

/// Production AMR service endpoint.
pub const AMR_ENDPOINT: &str = "https://ws.isiknowledge.com/cps/xrpc";

/// Post request bytes, get response bytes back.
///
/// The pipeline is generic over this seam so tests can substitute a
/// canned transport. No retries; network and HTTP-level failures are
/// fatal for the run.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn post(&self, body: String) -> Result<String, AmrError>;
}

/// [`Transport`] backed by a shared reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(AMR_ENDPOINT)
    }
}

impl Transport for HttpTransport {
    async fn post(&self, body: String) -> Result<String, AmrError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AmrError::Http { status });
        }

        Ok(resp.text().await?)
    }
}
