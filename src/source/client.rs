//! HTTP client for the bulk data manifest and document endpoints.

use reqwest::{Client, Method, Url};

use crate::config::get_config;
use crate::source::types::{FetchError, Manifest, ManifestFile};

/// Lightweight HTTP client for the bulk data service.
#[derive(Clone)]
pub struct GovInfoClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl GovInfoClient {
    /// Construct a client for `base_url`, optionally authenticating with `api_key`.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, FetchError> {
        let client = Client::builder().user_agent("billwatch/0.1").build()?;
        let base_url = normalize_base_url(base_url).map_err(FetchError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().is_some_and(|key| !key.is_empty()),
            "Initialized bulk data client"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Construct a client from the global configuration.
    pub fn from_config() -> Result<Self, FetchError> {
        let config = get_config();
        Self::new(&config.govinfo_base_url, config.govinfo_api_key.clone())
    }

    /// Manifest URL for one congress/session/bill-type folder.
    pub fn manifest_url(&self, congress: u32, session: u32, bill_type: &str) -> String {
        format!(
            "{}/bulkdata/BILLS/{congress}/{session}/{bill_type}",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Fetch the manifest listing for one congress/session/bill-type folder.
    pub async fn fetch_manifest(
        &self,
        congress: u32,
        session: u32,
        bill_type: &str,
    ) -> Result<Vec<ManifestFile>, FetchError> {
        let url = self.manifest_url(congress, session, bill_type);
        let response = self
            .request(Method::GET, &url)?
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = FetchError::UnexpectedStatus { status, body };
            tracing::warn!(congress, session, bill_type, error = %error, "Manifest request failed");
            return Err(error);
        }

        let body = response.text().await?;
        let manifest: Manifest = serde_json::from_str(&body)
            .map_err(|error| FetchError::InvalidManifest(error.to_string()))?;
        Ok(manifest.files)
    }

    /// Fetch the raw bytes of one document.
    pub async fn fetch_document(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.request(Method::GET, url)?.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = FetchError::UnexpectedStatus { status, body };
            tracing::warn!(url, error = %error, "Document request failed");
            return Err(error);
        }

        let bytes = response.bytes().await?;
        tracing::debug!(url, bytes = bytes.len(), "Document fetched");
        Ok(bytes.to_vec())
    }

    fn request(&self, method: Method, url: &str) -> Result<reqwest::RequestBuilder, FetchError> {
        let parsed = Url::parse(url).map_err(|error| FetchError::InvalidUrl(format!("{url}: {error}")))?;
        let mut req = self.client.request(method, parsed);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.query(&[("api_key", api_key)]);
        }
        Ok(req)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}
