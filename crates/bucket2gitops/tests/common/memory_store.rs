//! In-memory object store with injectable failures.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use bucket2gitops::store::{ListPage, ObjectStore, ObjectSummary, StoreError};

/// How a key misbehaves when fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// HTTP 503 on every attempt.
    Unavailable,
    /// HTTP 503 on the first `n` attempts, then success.
    UnavailableTimes(usize),
    /// HTTP 403 on every attempt.
    Forbidden,
}

#[derive(Default)]
pub struct MemoryStore {
    objects: BTreeMap<String, Vec<u8>>,
    failures: HashMap<String, Failure>,
    attempts: Mutex<HashMap<String, usize>>,
    list_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, key: &str, content: &str) -> Self {
        self.objects.insert(key.to_string(), content.as_bytes().to_vec());
        self
    }

    pub fn with_failure(mut self, key: &str, failure: Failure) -> Self {
        self.failures.insert(key.to_string(), failure);
        self
    }

    /// Fetch attempts made for `key` so far.
    pub fn attempts(&self, key: &str) -> usize {
        self.attempts
            .lock()
            .expect("attempts lock")
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn describe(&self) -> String {
        "memory://test".to_string()
    }

    async fn check_connectivity(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> Result<ListPage, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let mut matching = self
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation.as_deref().map_or(true, |after| key.as_str() > after));

        let objects: Vec<ObjectSummary> = matching
            .by_ref()
            .take(max_keys)
            .map(|(key, bytes)| ObjectSummary {
                key: key.clone(),
                size: bytes.len() as u64,
            })
            .collect();
        let next_continuation = match matching.next() {
            Some(_) => objects.last().map(|o| o.key.clone()),
            None => None,
        };

        Ok(ListPage {
            objects,
            next_continuation,
        })
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let attempt = {
            let mut attempts = self.attempts.lock().expect("attempts lock");
            let count = attempts.entry(key.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        match self.failures.get(key) {
            Some(Failure::Unavailable) => {
                return Err(StoreError::ServerError {
                    status: 503,
                    message: "SlowDown".to_string(),
                })
            }
            Some(Failure::UnavailableTimes(n)) if attempt <= *n => {
                return Err(StoreError::ServerError {
                    status: 503,
                    message: "SlowDown".to_string(),
                })
            }
            Some(Failure::Forbidden) => {
                return Err(StoreError::AuthenticationFailed {
                    status: 403,
                    message: "AccessDenied".to_string(),
                })
            }
            _ => {}
        }

        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound {
                key: key.to_string(),
            })
    }
}
