use std::{fmt, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::Value as Json;
use tracing::{debug, instrument};

use super::{DidDocument, DidResolution, DidResolver, ResolutionError};
use crate::{config::BaseUrl, core::util::{resolution_request, AsyncHttpClient}};

/// How long a resolved document is served from cache by default.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

const MAX_CACHED_DOCUMENTS: u64 = 10_000;

/// Fetches DID documents from a universal resolver over HTTP
/// (`<base>/1.0/identifiers/<did>`) and caches them for a fixed time.
///
/// Concurrent lookups of the same DID share a single fetch.
#[derive(Clone)]
pub struct ManagedHttpResolver {
    resolver_url: String,
    client: Arc<dyn AsyncHttpClient + Send + Sync>,
    cache: Cache<String, DidResolution>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolutionBody {
    did_document: DidDocument,
    #[serde(default, alias = "didResolutionMetadata")]
    resolver_metadata: Json,
}

impl ManagedHttpResolver {
    pub fn new(universal_resolver: &BaseUrl, client: Arc<dyn AsyncHttpClient + Send + Sync>) -> Self {
        Self::with_ttl(universal_resolver, client, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(
        universal_resolver: &BaseUrl,
        client: Arc<dyn AsyncHttpClient + Send + Sync>,
        ttl: Duration,
    ) -> Self {
        Self {
            resolver_url: format!("{}1.0/identifiers/", universal_resolver.as_str()),
            client,
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(MAX_CACHED_DOCUMENTS)
                .build(),
        }
    }

    /// The prefix DIDs are appended to.
    pub fn resolver_url(&self) -> &str {
        &self.resolver_url
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, did: &str) -> Result<DidResolution, ResolutionError> {
        let transport = |cause: anyhow::Error| ResolutionError::Transport {
            did: did.to_owned(),
            cause: Arc::new(cause),
        };

        let query = format!("{}{did}", self.resolver_url);
        debug!(%query, "cache miss, fetching DID document");

        let response = self
            .client
            .execute(resolution_request(&query).map_err(transport)?)
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "resolver did not return a document");
            return Err(ResolutionError::NotFound(did.to_owned()));
        }

        let body: ResolutionBody = serde_json::from_slice(response.body())
            .context("resolver response is not a DID resolution result")
            .map_err(transport)?;

        Ok(DidResolution {
            document: body.did_document,
            metadata: body.resolver_metadata,
        })
    }
}

#[async_trait]
impl DidResolver for ManagedHttpResolver {
    async fn resolve(&self, did: &str) -> Result<DidResolution, ResolutionError> {
        self.cache
            .try_get_with(did.to_owned(), self.fetch(did))
            .await
            .map_err(|e| e.as_ref().clone())
    }
}

impl fmt::Debug for ManagedHttpResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedHttpResolver")
            .field("resolver_url", &self.resolver_url)
            .field("client", &self.client)
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}
