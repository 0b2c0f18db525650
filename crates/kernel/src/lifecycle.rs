//! Ordered shutdown handling.
//!
//! Components register cleanup hooks as they finish constructing their
//! dependents, so reverse registration order mirrors dependency order: the
//! last-registered component stops first. [`Lifecycle::shutdown`] is
//! idempotent, isolates each hook's failure, and bounds the whole ordered run
//! with the configured stop timeout so one slow hook cannot block process
//! exit.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

type HookFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type ShutdownHook = Box<dyn FnOnce() -> HookFuture + Send>;

struct NamedHook {
    name: String,
    hook: ShutdownHook,
}

/// Ordered shutdown-hook registry for one process.
pub struct Lifecycle {
    hooks: Mutex<Vec<NamedHook>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    stop_timeout: Duration,
}

impl Lifecycle {
    /// Creates a lifecycle with the given stop timeout.
    pub fn new(stop_timeout: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            hooks: Mutex::new(Vec::new()),
            shutdown_tx,
            shutdown_rx,
            stop_timeout,
        }
    }

    /// Appends a shutdown hook.
    ///
    /// Hooks run in reverse registration order. A hook registered after
    /// shutdown has begun never runs.
    pub fn on_shutdown<F, Fut>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let named = NamedHook {
            name: name.into(),
            hook: Box::new(move || Box::pin(hook())),
        };
        self.hooks
            .lock()
            .expect("lifecycle hook lock poisoned")
            .push(named);
    }

    /// Returns `true` once shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Resolves once shutdown has begun. Used for graceful server shutdown.
    pub async fn stopped(&self) {
        let mut rx = self.shutdown_rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }

    /// Runs the registered hooks in reverse registration order.
    ///
    /// Idempotent: a re-entrant or concurrent second call is a no-op and
    /// every hook runs at most once. Each hook's failure is logged and
    /// swallowed so later-running hooks are unaffected. The whole run races
    /// the stop timeout; hooks still pending when it elapses are abandoned.
    pub async fn shutdown(&self, reason: &str) {
        if self.shutdown_tx.send_replace(true) {
            debug!(reason, "shutdown already in progress");
            return;
        }
        info!(reason, "shutdown started");

        let hooks = {
            let mut guard = self.hooks.lock().expect("lifecycle hook lock poisoned");
            std::mem::take(&mut *guard)
        };

        let ordered_run = async {
            for named in hooks.into_iter().rev() {
                match (named.hook)().await {
                    Ok(()) => debug!(hook = %named.name, "shutdown hook completed"),
                    Err(error) => {
                        warn!(hook = %named.name, error = %format!("{error:#}"), "shutdown hook failed");
                    }
                }
            }
        };

        if tokio::time::timeout(self.stop_timeout, ordered_run)
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.stop_timeout.as_secs(),
                "shutdown timed out, abandoning remaining hooks"
            );
        }
        info!("shutdown finished");
    }
}
