//! Remote data gateway
//!
//! The only I/O boundary of the service: retrieves upstream resource
//! collections over HTTP and keeps them in a TTL cache keyed by resource
//! name. Failures are returned to the caller and never cached.

use reqwest::Client;
use resource_cache::{Clock, SystemClock, TtlCache};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::error::FetchError;
use crate::models::{Comment, Post, Todo, User};

/// Cache name used for metrics labels
const CACHE_NAME: &str = "upstream_resources";

/// Upstream error bodies are cut to this many characters
const MAX_ERROR_BODY_CHARS: usize = 256;

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

/// Upstream resource collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Todos,
    Comments,
    Posts,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::Users,
        Resource::Todos,
        Resource::Comments,
        Resource::Posts,
    ];

    /// Stable name, also the cache key
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Todos => "todos",
            Resource::Comments => "comments",
            Resource::Posts => "posts",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded collection as held in the cache
#[derive(Debug, Clone)]
pub enum Collection {
    Users(Arc<Vec<User>>),
    Todos(Arc<Vec<Todo>>),
    Comments(Arc<Vec<Comment>>),
    Posts(Arc<Vec<Post>>),
}

/// Entity type served by one upstream resource
pub trait UpstreamEntity: DeserializeOwned + Send + Sync + Sized + 'static {
    const RESOURCE: Resource;

    fn into_collection(items: Arc<Vec<Self>>) -> Collection;

    fn from_collection(collection: Collection) -> Option<Arc<Vec<Self>>>;
}

macro_rules! upstream_entity {
    ($entity:ty, $variant:ident) => {
        impl UpstreamEntity for $entity {
            const RESOURCE: Resource = Resource::$variant;

            fn into_collection(items: Arc<Vec<Self>>) -> Collection {
                Collection::$variant(items)
            }

            fn from_collection(collection: Collection) -> Option<Arc<Vec<Self>>> {
                match collection {
                    Collection::$variant(items) => Some(items),
                    _ => None,
                }
            }
        }
    };
}

upstream_entity!(User, Users);
upstream_entity!(Todo, Todos);
upstream_entity!(Comment, Comments);
upstream_entity!(Post, Posts);

/// HTTP client for the upstream API with a read-through cache
pub struct DataGateway {
    client: Client,
    config: UpstreamConfig,
    cache: TtlCache<Collection>,
}

impl DataGateway {
    pub fn new(config: UpstreamConfig, ttl: Duration) -> Result<Self, reqwest::Error> {
        Self::with_clock(config, ttl, Arc::new(SystemClock))
    }

    /// Build a gateway whose cache expiry follows `clock`
    pub fn with_clock(
        config: UpstreamConfig,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            config,
            cache: TtlCache::with_clock(CACHE_NAME, ttl, clock),
        })
    }

    pub fn cache(&self) -> &TtlCache<Collection> {
        &self.cache
    }

    /// Fetch the collection for `T`, from cache when fresh
    pub async fn fetch<T: UpstreamEntity>(&self) -> Result<Arc<Vec<T>>, FetchError> {
        let resource = T::RESOURCE;

        let collection = self
            .cache
            .get_or_try_fetch(resource.as_str(), || async {
                let items = self.download::<T>().await?;
                Ok::<_, FetchError>(T::into_collection(Arc::new(items)))
            })
            .await?;

        T::from_collection(collection).ok_or_else(|| {
            FetchError::decode(resource, "cached entry holds a different resource")
        })
    }

    pub async fn users(&self) -> Result<Arc<Vec<User>>, FetchError> {
        self.fetch::<User>().await
    }

    pub async fn todos(&self) -> Result<Arc<Vec<Todo>>, FetchError> {
        self.fetch::<Todo>().await
    }

    pub async fn comments(&self) -> Result<Arc<Vec<Comment>>, FetchError> {
        self.fetch::<Comment>().await
    }

    pub async fn posts(&self) -> Result<Arc<Vec<Post>>, FetchError> {
        self.fetch::<Post>().await
    }

    async fn download<T: UpstreamEntity>(&self) -> Result<Vec<T>, FetchError> {
        let resource = T::RESOURCE;
        let url = self.config.url(resource);

        debug!(resource = %resource, url = %url, "Fetching upstream collection");

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(resource = %resource, url = %url, error = %e, "Upstream request failed");
            FetchError::transport(resource, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(
                resource = %resource,
                status = status.as_u16(),
                "Upstream returned non-success status"
            );
            return Err(FetchError::status(
                resource,
                status.as_u16(),
                truncate_body(&body),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(resource, e))?;

        let items: Vec<T> = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(resource = %resource, error = %e, "Upstream payload could not be decoded");
            FetchError::decode(resource, e)
        })?;

        debug!(resource = %resource, count = items.len(), "Fetched upstream collection");
        Ok(items)
    }
}
