//! Client for the gateway's product search endpoint.

use reqwest::Client;
use storefront_core::Product;
use tracing::{debug, warn};
use url::Url;

use crate::config::SearchConfig;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid search base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search endpoint returned status {0}")]
    Status(u16),
}

/// Runs `GET <base>/products?name=<term>` against the gateway.
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: Client,
    endpoint: Url,
    bearer_token: Option<String>,
}

impl SearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let mut base = Url::parse(&config.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("products")?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            endpoint,
            bearer_token: config.bearer_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Products whose name matches `term`.
    pub async fn search(&self, term: &str) -> Result<Vec<Product>, SearchError> {
        let mut request = self.http.get(self.endpoint.clone()).query(&[("name", term)]);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), term = %term, "Search endpoint returned an error");
            return Err(SearchError::Status(status.as_u16()));
        }

        let products: Vec<Product> = response.json().await?;
        debug!(term = %term, count = products.len(), "Search completed");
        Ok(products)
    }
}
