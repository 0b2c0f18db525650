//! Feature modules.
//!
//! Modules extend the kernel with the platform's actual features (content,
//! notifications, workflows). Loading is an explicit two-phase contract
//! enforced by the trait, not by convention:
//!
//! 1. `register` — pure registration of factories; resolving tokens here is
//!    forbidden because sibling modules may not have registered yet.
//! 2. `contribute` — resolution and side-effecting wiring, run only after
//!    *every* module has registered.

use async_trait::async_trait;

use crate::container::Container;

/// A feature module loaded during bootstrap.
#[async_trait]
pub trait KernelModule: Send + Sync {
    /// Module name for logging.
    fn name(&self) -> &'static str;

    /// Phase 1: registers this module's factories on the container.
    ///
    /// Must not resolve tokens; sibling modules register after this one.
    fn register(&self, container: &Container) -> anyhow::Result<()>;

    /// Phase 2: resolves dependencies and performs wiring, after every
    /// module's `register` has run.
    async fn contribute(&self, _container: &Container) -> anyhow::Result<()> {
        Ok(())
    }
}
