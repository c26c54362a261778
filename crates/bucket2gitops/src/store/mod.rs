//! Object store access.
//!
//! Backends implement [`ObjectStore`]; [`ObjectStoreClient`] adds what every
//! backend needs on top: a connectivity check at start-up, batched listing,
//! retry with backoff, a per-fetch deadline and bounded concurrent fetches.

pub mod client;
pub mod error;
pub mod filesystem;
pub mod retry;
pub mod s3;
pub mod sigv4;

use async_trait::async_trait;

pub use client::{ClientSettings, ObjectLister, ObjectStoreClient};
pub use error::StoreError;
pub use filesystem::FilesystemStore;
pub use retry::{backoff_delay, RetryPolicy};
pub use s3::{S3Settings, S3Store};

/// Object bytes as fetched, before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub size: usize,
}

/// One listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

/// One page of a listing. `next_continuation` is `None` on the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    pub next_continuation: Option<String>,
}

/// A bucket-like source of objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable location for logs.
    fn describe(&self) -> String;

    async fn check_connectivity(&self) -> error::Result<()>;

    /// Lists up to `max_keys` keys starting with `prefix`, in key order.
    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> error::Result<ListPage>;

    async fn get_object(&self, key: &str) -> error::Result<Vec<u8>>;
}
