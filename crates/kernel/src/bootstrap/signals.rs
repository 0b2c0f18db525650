//! Process signal handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::lifecycle::Lifecycle;

/// Guards against duplicate installation across repeated bootstraps in one
/// process (a production binary boots once; test harnesses may not).
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Installs SIGINT/SIGTERM handlers that trigger the lifecycle's shutdown
/// exactly once.
///
/// Returns `false` without installing anything when handlers are already
/// installed in this process. The shutdown run itself is bounded by the
/// lifecycle's stop timeout, so a slow hook cannot block process exit.
pub fn install_signal_handlers(lifecycle: Arc<Lifecycle>) -> bool {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        debug!("signal handlers already installed, skipping");
        return false;
    }

    {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received SIGINT");
                lifecycle.shutdown("SIGINT").await;
            }
        });
    }

    #[cfg(unix)]
    tokio::spawn(async move {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                if sigterm.recv().await.is_some() {
                    info!("received SIGTERM");
                    lifecycle.shutdown("SIGTERM").await;
                }
            }
            Err(error) => warn!(%error, "unable to install SIGTERM handler"),
        }
    });

    true
}
