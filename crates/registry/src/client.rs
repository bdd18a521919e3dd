use crate::error::{RegistryError, RegistryResult};
use crate::models::{ChainDescriptor, ChainList};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

/// First retry delay, doubled on every further attempt
pub const BASE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Source of chain ids and chain descriptors
#[async_trait]
pub trait ChainDirectory: Send + Sync {
    /// Lists the chain ids known to the directory
    async fn fetch_chain_list(&self) -> RegistryResult<Vec<String>>;

    /// Fetches the descriptor of one chain
    async fn fetch_chain(&self, chain_id: &str) -> RegistryResult<ChainDescriptor>;
}

/// Chain directory served over HTTP (`/chains`, `/chains/{id}`)
#[derive(Debug, Clone)]
pub struct HttpChainDirectory {
    base_url: Url,
    http_client: Client,
    retries: u32,
}

impl HttpChainDirectory {
    /// Creates a client with a per-request `timeout` that retries transport
    /// failures and server errors up to `retries` times
    pub fn new(base_url: &str, timeout: Duration, retries: u32) -> RegistryResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RegistryError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RegistryError::InvalidUrl(base_url.to_string()));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tinyseed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| RegistryError::Http {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self::with_client(http_client, base_url, retries))
    }

    /// Creates a client around an existing HTTP client
    pub fn with_client(client: Client, base_url: Url, retries: u32) -> Self {
        Self {
            base_url,
            http_client: client,
            retries,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends path segments to the base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> RegistryResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> RegistryResult<T> {
        let mut attempt = 0u32;
        loop {
            match self.get_once(&url).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    let delay = BASE_RETRY_DELAY * 2u32.pow(attempt.min(10));
                    attempt += 1;
                    warn!(%url, attempt, retry_in = ?delay, "registry request failed: {}", e);
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &Url) -> RegistryResult<T> {
        debug!(%url, "registry request");
        let http_error = |source| RegistryError::Http {
            url: url.to_string(),
            source,
        };

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(http_error)?;
        serde_json::from_slice(&body).map_err(|e| RegistryError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ChainDirectory for HttpChainDirectory {
    async fn fetch_chain_list(&self) -> RegistryResult<Vec<String>> {
        let list: ChainList = self.get_json(self.endpoint(&["chains"])?).await?;
        debug!(count = list.chains.len(), "fetched chain list");
        Ok(list.chains)
    }

    async fn fetch_chain(&self, chain_id: &str) -> RegistryResult<ChainDescriptor> {
        let chain: ChainDescriptor = self.get_json(self.endpoint(&["chains", chain_id])?).await?;
        debug!(chain = %chain_id, peers = chain.raw_peers().len(), "fetched chain");
        Ok(chain)
    }
}
