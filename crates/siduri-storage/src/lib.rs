//! Blob store access for the siduri pipelines.
//!
//! This crate provides:
//! - The `BlobStore` trait the pipelines depend on
//! - An S3-compatible bucket client (GCS interoperability by default)
//! - An in-memory store for local runs and tests

pub mod client;
pub mod error;
pub mod memory;
pub mod store;

pub use client::{BucketClient, BucketConfig};
pub use error::{StorageError, StorageResult};
pub use memory::{MemoryStore, StoredObject};
pub use store::BlobStore;
