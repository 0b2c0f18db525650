//! Token-keyed dependency container with scoped lifecycles.
//!
//! The container is a tree: the root is created once at boot, and a child
//! scope is created per HTTP request, per background job, and per scheduled
//! run. Registrations are owned by the node they were registered on; lookup
//! walks from the resolving node toward the root, so a scope sees everything
//! its ancestors registered and may shadow a parent's token with its own
//! registration.
//!
//! # Cache modes
//!
//! | Mode | Factory runs | Value cached on |
//! |-------------|--------------------------|-----------------|
//! | `Singleton` | once per process | the root node |
//! | `Scoped` | once per scope | the resolving node |
//! | `Transient` | every resolution | nowhere |
//!
//! Singleton values are always stored on the root regardless of which scope
//! resolved them first, so every scope observes the same instance. Concurrent
//! first resolutions of one token share a single in-flight construction; the
//! factories of unrelated tokens are never serialized against each other.
//!
//! # Factories
//!
//! A factory is an async function receiving the *resolving* container (which
//! may be a scope, not the root). A singleton adapter can therefore read
//! per-request ambient values at construction time without a second context
//! parameter threaded through every factory.
//!
//! Duplicate registration and resolution of unknown tokens are wiring bugs:
//! both fail immediately with a [`ContainerError`] and are never swallowed.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock, Weak};

use thiserror::Error;
use tokio::sync::OnceCell;

/// An opaque, stable key identifying a capability (e.g. `"adapter.auth"`).
///
/// Tokens are process-wide constants; see [`crate::tokens`] for the kernel's
/// own set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(&'static str);

impl Token {
    /// Creates a token from a static key string.
    pub const fn new(key: &'static str) -> Self {
        Self(key)
    }

    /// Returns the key string.
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Caching discipline for a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Construct once per process; cached on the root node.
    Singleton,
    /// Construct once per scope; cached on the resolving node.
    Scoped,
    /// Construct on every resolution; never cached.
    Transient,
}

/// Errors raised by container operations.
///
/// These indicate wiring bugs, not runtime conditions: they are always fatal
/// to the operation that raised them and are never retried.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// The token is already registered on this node.
    #[error("token {token} already registered on this container")]
    DuplicateToken {
        /// The offending token.
        token: Token,
    },

    /// The token is not registered on this node or any ancestor.
    #[error("token {token} not registered on this container or any ancestor")]
    UnknownToken {
        /// The token that was looked up.
        token: Token,
    },

    /// The cached value's type does not match the requested type.
    #[error("token {token} resolved to a value that is not a {expected}")]
    TypeMismatch {
        /// The token that was resolved.
        token: Token,
        /// The requested Rust type.
        expected: &'static str,
    },

    /// The registered factory failed.
    #[error("factory for token {token} failed")]
    Factory {
        /// The token whose factory failed.
        token: Token,
        /// The factory's error.
        #[source]
        source: anyhow::Error,
    },
}

impl ContainerError {
    /// Returns the stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ContainerError::DuplicateToken { .. } => "container_duplicate_token",
            ContainerError::UnknownToken { .. } => "container_unknown_token",
            ContainerError::TypeMismatch { .. } => "container_type_mismatch",
            ContainerError::Factory { .. } => "container_factory_failed",
        }
    }
}

type AnyValue = Arc<dyn Any + Send + Sync>;
type FactoryFuture = Pin<Box<dyn Future<Output = anyhow::Result<AnyValue>> + Send>>;
type FactoryFn = dyn Fn(Container) -> FactoryFuture + Send + Sync;
type CacheSlots = RwLock<HashMap<Token, Arc<OnceCell<AnyValue>>>>;

struct Registration {
    factory: Arc<FactoryFn>,
    mode: CacheMode,
}

struct Node {
    /// Lookup-only; a scope never keeps its ancestors alive.
    parent: Option<Weak<Node>>,
    registrations: RwLock<HashMap<Token, Registration>>,
    /// Populated only on the root node.
    singletons: CacheSlots,
    scoped: CacheSlots,
}

impl Node {
    fn new(parent: Option<Weak<Node>>) -> Self {
        Self {
            parent,
            registrations: RwLock::new(HashMap::new()),
            singletons: RwLock::new(HashMap::new()),
            scoped: RwLock::new(HashMap::new()),
        }
    }
}

/// A node in the container tree. Cheap to clone; clones share the node.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Node>,
}

impl Container {
    /// Creates a new root container.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Node::new(None)),
        }
    }

    /// Creates a child scope of this container.
    ///
    /// The scope sees registrations on this node and all ancestors, owns its
    /// own scoped cache, and is discarded (along with that cache) when
    /// dropped. The parent link is weak: a scope never keeps its ancestors
    /// alive.
    pub fn create_scope(&self) -> Self {
        Self {
            inner: Arc::new(Node::new(Some(Arc::downgrade(&self.inner)))),
        }
    }

    /// Registers a factory under `token` on this node.
    ///
    /// Registering a token that already exists on this node fails with
    /// [`ContainerError::DuplicateToken`]. Shadowing a token registered on an
    /// ancestor is allowed and intentional.
    pub fn register<T, F, Fut>(
        &self,
        token: Token,
        mode: CacheMode,
        factory: F,
    ) -> Result<(), ContainerError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let factory: Arc<FactoryFn> = Arc::new(move |scope| {
            let fut = factory(scope);
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as AnyValue) })
        });

        let mut registrations = self
            .inner
            .registrations
            .write()
            .expect("container registration lock poisoned");
        if registrations.contains_key(&token) {
            return Err(ContainerError::DuplicateToken { token });
        }
        registrations.insert(token, Registration { factory, mode });
        Ok(())
    }

    /// Registers an already-constructed value under `token` as a singleton.
    ///
    /// Convenience for boot-time wiring where the value exists before the
    /// container does.
    pub fn register_value<T>(&self, token: Token, value: T) -> Result<(), ContainerError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.register(token, CacheMode::Singleton, move |_| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    /// Resolves `token` to a value of type `T`.
    ///
    /// Lookup starts on this node and walks ancestors; behavior then follows
    /// the registration's [`CacheMode`]. Fails with
    /// [`ContainerError::UnknownToken`] when no ancestor carries the token
    /// and [`ContainerError::TypeMismatch`] when `T` does not match the
    /// registered value type.
    pub async fn resolve<T>(&self, token: Token) -> Result<T, ContainerError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let value = self.resolve_any(token).await?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or(ContainerError::TypeMismatch {
                token,
                expected: std::any::type_name::<T>(),
            })
    }

    async fn resolve_any(&self, token: Token) -> Result<AnyValue, ContainerError> {
        let (factory, mode) = self
            .find_registration(token)
            .ok_or(ContainerError::UnknownToken { token })?;

        match mode {
            CacheMode::Transient => self.run_factory(token, &factory).await,
            CacheMode::Scoped => {
                let cell = slot(&self.inner.scoped, token);
                self.init_slot(token, &factory, &cell).await
            }
            CacheMode::Singleton => {
                let root = self.root();
                let cell = slot(&root.singletons, token);
                self.init_slot(token, &factory, &cell).await
            }
        }
    }

    /// Initializes a cache slot, deduplicating concurrent first resolutions:
    /// all callers await the same in-flight construction and the factory runs
    /// at most once per slot.
    async fn init_slot(
        &self,
        token: Token,
        factory: &Arc<FactoryFn>,
        cell: &Arc<OnceCell<AnyValue>>,
    ) -> Result<AnyValue, ContainerError> {
        let value = cell
            .get_or_try_init(|| self.run_factory(token, factory))
            .await?;
        Ok(value.clone())
    }

    async fn run_factory(
        &self,
        token: Token,
        factory: &Arc<FactoryFn>,
    ) -> Result<AnyValue, ContainerError> {
        // The factory receives the resolving container, not the owner of the
        // registration, so construction can observe scope-local state.
        factory(self.clone())
            .await
            .map_err(|source| ContainerError::Factory { token, source })
    }

    fn find_registration(&self, token: Token) -> Option<(Arc<FactoryFn>, CacheMode)> {
        let mut node = self.inner.clone();
        loop {
            if let Some(registration) = node
                .registrations
                .read()
                .expect("container registration lock poisoned")
                .get(&token)
            {
                return Some((registration.factory.clone(), registration.mode));
            }
            node = node.parent.as_ref().and_then(Weak::upgrade)?;
        }
    }

    fn root(&self) -> Arc<Node> {
        let mut node = self.inner.clone();
        while let Some(parent) = node.parent.as_ref().and_then(Weak::upgrade) {
            node = parent;
        }
        node
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the cache cell for `token`, inserting an empty one if absent.
fn slot(slots: &CacheSlots, token: Token) -> Arc<OnceCell<AnyValue>> {
    if let Some(cell) = slots
        .read()
        .expect("container cache lock poisoned")
        .get(&token)
    {
        return cell.clone();
    }
    slots
        .write()
        .expect("container cache lock poisoned")
        .entry(token)
        .or_insert_with(|| Arc::new(OnceCell::new()))
        .clone()
}
