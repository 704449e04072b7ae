//! bf-core: Core library for bucketfence
//!
//! This crate provides root-confined access to hierarchical bucket/object
//! storage, including:
//! - Resource identifier normalization and root confinement
//! - The `Backend` trait storage media implement
//! - The `Store` facade with its bucket, object and permission operations
//! - Client identity and the authorization collaborator
//! - Configuration management
//! - In-memory and local filesystem backends
//!
//! This crate is independent of any network SDK; the S3 backend lives in
//! `bf-s3`.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod local;
pub mod memory;
pub mod resource;
pub mod retry;
pub mod store;

pub use auth::{Action, Authority, Client, DefaultAuthority, Effect, Grants, Permission};
pub use backend::{Backend, Bucket, Entry, EntryKind, Object, Resource, ResourceKind, ResourceType};
pub use config::{BackendConfig, Config, ConfigManager, RetryConfig, S3Config, StoreConfig};
pub use error::{BackendError, BackendResult, Error, ErrorKind, Result};
pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use resource::{ResourceId, confine, normalize, resolve};
pub use retry::{RetryBuilder, retry_with_backoff};
pub use store::{Store, StoreBuilder};
