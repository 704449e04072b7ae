//! The store facade
//!
//! A [`Store`] binds a root, one backend and the client's permission state.
//! Every name is resolved against the root and confined to it before the
//! backend sees it.
//!
//! Two calling conventions coexist on purpose:
//! - mutations (`create_bucket`, `delete_bucket`, `set_object`,
//!   `delete_object`) return `Result<()>`;
//! - reads (`list_contents`, `get_object`) return `Option`, logging the
//!   reason for a `None` as a warning. `try_list_contents` and
//!   `try_get_object` expose the typed error instead.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::auth::{Authority, Client, DefaultAuthority, Permission};
use crate::backend::{Backend, Entry, ResourceKind, ResourceType};
use crate::error::{Error, Result};
use crate::resource::{ResourceId, confine, resolve};

/// Identity used when no client is supplied
pub const ANONYMOUS: &str = "anonymous";

/// Root-confined access to one backend for one client session
pub struct Store<B: Backend> {
    root: ResourceId,
    backend: B,
    client: Client,
    authority: Arc<dyn Authority>,
}

/// Builder for [`Store`]
pub struct StoreBuilder<B: Backend> {
    backend: B,
    root: String,
    client: Option<Client>,
    authority: Option<Arc<dyn Authority>>,
}

impl<B: Backend> StoreBuilder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            root: "/".to_string(),
            client: None,
            authority: None,
        }
    }

    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn authority(mut self, authority: Arc<dyn Authority>) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Validate the root and open the store
    ///
    /// Fails if the root already denotes an object. A root that is not yet
    /// a bucket is created; if that creation fails the store is still
    /// returned and a warning is logged.
    pub async fn build(self) -> Result<Store<B>> {
        if self.root.trim().is_empty() {
            return Err(Error::Construction("root name cannot be empty".to_string()));
        }

        let root = ResourceId::new(&self.root);
        if self.backend.is_object(&root).await {
            return Err(Error::Construction(format!(
                "root {root} is an object, not a bucket"
            )));
        }

        let store = Store {
            root,
            backend: self.backend,
            client: self.client.unwrap_or_else(|| Client::new(ANONYMOUS)),
            authority: self
                .authority
                .unwrap_or_else(|| Arc::new(DefaultAuthority)),
        };

        if !store.backend.is_bucket(&store.root).await {
            let bucket = B::Bucket::from(store.root.clone());
            match store.backend.create_bucket(&bucket).await {
                Ok(()) => tracing::debug!(root = %store.root, "Created store root"),
                Err(e) => tracing::warn!(
                    root = %store.root,
                    error = %e,
                    "Failed to create store root"
                ),
            }
        }

        Ok(store)
    }
}

impl<B: Backend> Store<B> {
    /// Open a store with the default authority
    pub async fn new(client: Client, root: &str, backend: B) -> Result<Self> {
        StoreBuilder::new(backend)
            .root(root)
            .client(client)
            .build()
            .await
    }

    pub fn builder(backend: B) -> StoreBuilder<B> {
        StoreBuilder::new(backend)
    }

    pub fn root(&self) -> &ResourceId {
        &self.root
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn authority(&self) -> &dyn Authority {
        self.authority.as_ref()
    }

    /// Resolve `name` against the root, refusing anything outside it
    pub fn locate(&self, name: &str) -> Result<ResourceId> {
        let id = resolve(&self.root, name);
        if confine(&self.root, &id) {
            Ok(id)
        } else {
            Err(Error::Confinement {
                name: name.to_string(),
                root: self.root.clone(),
            })
        }
    }

    // ========== Buckets ==========

    /// Create a bucket; an empty name targets the root
    pub async fn create_bucket(&self, name: &str) -> Result<()> {
        let id = self.locate(name)?;
        tracing::debug!(id = %id, "create_bucket");
        self.backend.create_bucket(&B::Bucket::from(id)).await?;
        Ok(())
    }

    /// List a bucket, logging and returning `None` on any failure
    pub async fn list_contents(&self, name: &str) -> Option<Vec<Entry>> {
        match self.try_list_contents(name).await {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Failed to list bucket contents");
                None
            }
        }
    }

    pub async fn try_list_contents(&self, name: &str) -> Result<Vec<Entry>> {
        let id = self.locate(name)?;
        tracing::debug!(id = %id, "read_bucket");
        Ok(self.backend.read_bucket(&B::Bucket::from(id)).await?)
    }

    pub async fn delete_bucket(&self, name: &str) -> Result<()> {
        let id = self.locate(name)?;
        tracing::debug!(id = %id, "delete_bucket");
        self.backend.delete_bucket(&B::Bucket::from(id)).await?;
        Ok(())
    }

    // ========== Objects ==========

    /// Write an object inside an existing bucket
    pub async fn set_object(&self, name: &str, value: impl Into<Bytes>) -> Result<()> {
        let id = self.locate(name)?;

        if self.backend.is_bucket(&id).await {
            return Err(Error::IsBucket(name.to_string()));
        }
        if !self.backend.is_bucket(&id.parent()).await {
            return Err(Error::MissingParent(name.to_string()));
        }

        tracing::debug!(id = %id, "create_object");
        self.backend
            .create_object(&B::Object::from(id), value.into())
            .await?;
        Ok(())
    }

    /// Read an object, logging and returning `None` on any failure
    pub async fn get_object(&self, name: &str) -> Option<Bytes> {
        match self.try_get_object(name).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Failed to read object");
                None
            }
        }
    }

    pub async fn try_get_object(&self, name: &str) -> Result<Bytes> {
        let id = self.locate(name)?;
        tracing::debug!(id = %id, "read_object");
        Ok(self.backend.read_object(&B::Object::from(id)).await?)
    }

    pub async fn delete_object(&self, name: &str) -> Result<()> {
        let id = self.locate(name)?;
        tracing::debug!(id = %id, "delete_object");
        self.backend.delete_object(&B::Object::from(id)).await?;
        Ok(())
    }

    // ========== Predicates ==========

    pub fn is_local(&self) -> bool {
        self.backend.is_local()
    }

    pub async fn is_bucket(&self, name: &str) -> bool {
        match self.locate(name) {
            Ok(id) => self.backend.is_bucket(&id).await,
            Err(e) => {
                tracing::warn!(error = %e, "Refusing bucket probe");
                false
            }
        }
    }

    pub async fn is_object(&self, name: &str) -> bool {
        match self.locate(name) {
            Ok(id) => self.backend.is_object(&id).await,
            Err(e) => {
                tracing::warn!(error = %e, "Refusing object probe");
                false
            }
        }
    }

    // ========== Permissions ==========

    /// The backend type that stands for a symbolic resource kind
    pub fn resource_type(&self, kind: ResourceKind) -> ResourceType {
        match kind {
            ResourceKind::Bucket => ResourceType::of::<B::Bucket>(),
            ResourceKind::Object => ResourceType::of::<B::Object>(),
        }
    }

    /// Set the type-wide permission for `kind` (`"bucket"` or `"object"`)
    ///
    /// Any other kind is logged and ignored.
    pub fn set_permission(&self, kind: &str, permission: Permission) {
        match kind.parse::<ResourceKind>() {
            Ok(kind) => self.set_kind_permission(kind, permission),
            Err(_) => {
                let e = Error::UnknownResourceKind(kind.to_string());
                tracing::warn!(error = %e, "Ignoring permission");
            }
        }
    }

    pub fn set_kind_permission(&self, kind: ResourceKind, permission: Permission) {
        let resource_type = self.resource_type(kind);
        tracing::debug!(kind = %kind, resource_type = %resource_type, "set_type_permission");
        self.authority
            .set_type_permission(&self.client, resource_type, permission);
    }
}

impl<B: Backend> fmt::Debug for Store<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("root", &self.root)
            .field("identity", &self.client.identity())
            .field("local", &self.backend.is_local())
            .finish_non_exhaustive()
    }
}
