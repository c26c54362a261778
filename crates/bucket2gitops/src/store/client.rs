use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use super::error::{Result, StoreError};
use super::retry::RetryPolicy;
use super::{ObjectStore, ObjectSummary, RawObject};
use crate::sanitize::redact_key;

pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_FETCH_DEADLINE: Duration = Duration::from_secs(300);
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Client-side behaviour shared by all backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    /// Upper bound on concurrent fetches within a batch.
    pub max_connections: usize,
    /// Wall-clock limit for one fetch including all retries.
    pub fetch_deadline: Duration,
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            fetch_deadline: DEFAULT_FETCH_DEADLINE,
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    settings: ClientSettings,
}

impl std::fmt::Debug for ObjectStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreClient")
            .field("store", &self.store.describe())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ObjectStoreClient {
    /// Wraps a backend after verifying it is reachable.
    pub async fn connect(store: Arc<dyn ObjectStore>, settings: ClientSettings) -> Result<Self> {
        log::info!("Connecting to {}", store.describe());
        store.check_connectivity().await.map_err(|e| match e {
            e @ (StoreError::AuthenticationFailed { .. } | StoreError::BucketNotFound { .. }) => e,
            other => StoreError::ConnectionFailed {
                message: format!("{} is unreachable: {}", store.describe(), other),
            },
        })?;
        Ok(Self { store, settings })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Starts a lazy listing; each call to [`ObjectLister::next_batch`]
    /// requests one page of at most `batch_size` keys.
    pub fn list_objects(&self, prefix: &str) -> ObjectLister<'_> {
        ObjectLister {
            client: self,
            prefix: prefix.to_string(),
            continuation: None,
            exhausted: false,
        }
    }

    /// Fetches one object with retry, bounded by the fetch deadline.
    pub async fn fetch(&self, key: &str) -> Result<RawObject> {
        let deadline = self.settings.fetch_deadline;
        let attempt = self.settings.retry.run(key, || self.store.get_object(key));

        match tokio::time::timeout(deadline, attempt).await {
            Ok(Ok(bytes)) => {
                log::debug!("Fetched {} ({} bytes)", redact_key(key), bytes.len());
                Ok(RawObject {
                    key: key.to_string(),
                    size: bytes.len(),
                    bytes,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(StoreError::OperationTimeout {
                key: key.to_string(),
                deadline,
            }),
        }
    }

    /// Fetches keys concurrently, at most `max_connections` at a time.
    /// Results come back in the order of `keys`.
    pub async fn fetch_batch(&self, keys: &[String]) -> Vec<(String, Result<RawObject>)> {
        stream::iter(keys.iter())
            .map(|key| async move { (key.clone(), self.fetch(key).await) })
            .buffered(self.settings.max_connections.max(1))
            .collect()
            .await
    }
}

/// Page-by-page listing state.
pub struct ObjectLister<'a> {
    client: &'a ObjectStoreClient,
    prefix: String,
    continuation: Option<String>,
    exhausted: bool,
}

impl ObjectLister<'_> {
    /// Returns the next batch of keys, or `None` once the listing is done.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<ObjectSummary>>> {
        if self.exhausted {
            return Ok(None);
        }

        let store = &self.client.store;
        let batch_size = self.client.settings.batch_size.max(1);
        let prefix = self.prefix.as_str();
        let continuation = self.continuation.clone();
        let page = self
            .client
            .settings
            .retry
            .run(prefix, || {
                store.list_page(prefix, continuation.clone(), batch_size)
            })
            .await?;

        self.continuation = page.next_continuation;
        self.exhausted = self.continuation.is_none();
        if page.objects.is_empty() && self.exhausted {
            return Ok(None);
        }
        Ok(Some(page.objects))
    }
}
