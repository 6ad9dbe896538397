use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use tracing::debug;

use crate::error::FetchError;

const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/74.0.3729.131 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3";

/// Source of raw release documents. One call, one attempt: retry policy
/// belongs to the caller.
pub trait Fetch {
    fn fetch(&self, id: i64) -> Result<String, FetchError>;
}

/// Blocking HTTP fetcher against the `PressReleasePage.aspx?PRID=` template.
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .default_headers(browser_headers())
            .timeout(timeout)
            .build()?;
        Ok(HttpFetcher {
            client,
            base_url: base_url.trim_end_matches('?').to_string(),
        })
    }

    pub fn url_for(&self, id: i64) -> String {
        format!("{}?PRID={}", self.base_url, id)
    }
}

/// Accept-Encoding is negotiated by reqwest itself so bodies are decompressed.
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
    headers.insert(REFERER, HeaderValue::from_static("https://google.com"));
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers
}

impl Fetch for HttpFetcher {
    fn fetch(&self, id: i64) -> Result<String, FetchError> {
        let url = self.url_for(id);
        let start = Instant::now();
        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let bytes = response.bytes()?;
        debug!(id, bytes = bytes.len(), latency_ms = start.elapsed().as_millis() as u64, "fetched");
        String::from_utf8(bytes.to_vec()).map_err(|_| FetchError::Decode)
    }
}
