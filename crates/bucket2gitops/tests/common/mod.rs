//! Shared test utilities for bucket2gitops integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs with a temp bucket and output directory
//! - `MemoryStore` for keys and failures a directory cannot express
//! - Builders for configs and manifests

pub mod builders;
pub mod harness;
pub mod memory_store;

pub use builders::*;
pub use harness::TestHarness;
pub use memory_store::MemoryStore;
