//! Runtime modes.
//!
//! Bootstrap starts exactly one mode. The API mode serves the HTTP
//! entrypoint; the worker mode drains an injected job queue; the scheduler
//! mode runs an interval tick. All three create one container scope per unit
//! of work and stop when the lifecycle begins shutdown.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atrium_core::config::PlatformConfig;
use atrium_core::{AuthContext, RequestContext};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::container::{Container, ContainerError};
use crate::entrypoint::{create_app, EntrypointState, HandlerContext};
use crate::lifecycle::Lifecycle;
use crate::tenant::{JobTenantSelector, TenantResolver};
use crate::tokens;

/// The runtime mode a process boots into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    /// Serve the HTTP entrypoint.
    Api,
    /// Drain the injected job queue.
    Worker,
    /// Run the interval tick loop.
    Scheduler,
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeMode::Api => write!(f, "api"),
            RuntimeMode::Worker => write!(f, "worker"),
            RuntimeMode::Scheduler => write!(f, "scheduler"),
        }
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "api" => Ok(RuntimeMode::Api),
            "worker" => Ok(RuntimeMode::Worker),
            "scheduler" => Ok(RuntimeMode::Scheduler),
            other => Err(format!("unknown runtime mode: {other}")),
        }
    }
}

/// One unit of background work.
#[derive(Debug, Clone)]
pub struct JobPayload {
    /// Job kind, used as the scope's path.
    pub kind: String,
    /// Explicit tenant selection for this job.
    pub tenant: JobTenantSelector,
    /// Free-form job data.
    pub data: serde_json::Value,
}

/// Source of background jobs, contributed via [`tokens::JOB_QUEUE`].
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Returns the next job, or `None` when the queue is closed.
    async fn next_job(&self) -> Option<JobPayload>;
}

/// Background job handler, contributed via [`tokens::JOB_HANDLER`].
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Handles one job within its composed context.
    async fn handle(&self, ctx: HandlerContext, job: JobPayload) -> anyhow::Result<()>;
}

/// Scheduler tick handler, contributed via [`tokens::TICK_HANDLER`].
#[async_trait]
pub trait TickHandler: Send + Sync {
    /// Runs one scheduled tick within its composed context.
    async fn tick(&self, ctx: HandlerContext) -> anyhow::Result<()>;
}

/// Handle on a started runtime mode.
pub struct ModeHandle {
    /// The mode's driver task; completes once the mode has stopped.
    pub task: JoinHandle<()>,
    /// Bound address, for the API mode.
    pub local_addr: Option<SocketAddr>,
}

/// Starts the selected runtime mode.
pub(crate) async fn start(
    mode: RuntimeMode,
    container: &Container,
    lifecycle: Arc<Lifecycle>,
    config: Arc<PlatformConfig>,
) -> anyhow::Result<ModeHandle> {
    match mode {
        RuntimeMode::Api => start_api(container, lifecycle, config).await,
        RuntimeMode::Worker => start_worker(container, lifecycle).await,
        RuntimeMode::Scheduler => start_scheduler(container, lifecycle, config).await,
    }
}

async fn start_api(
    container: &Container,
    lifecycle: Arc<Lifecycle>,
    config: Arc<PlatformConfig>,
) -> anyhow::Result<ModeHandle> {
    let state = EntrypointState::from_container(container).await?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
    let local_addr = listener.local_addr()?;
    info!(address = %local_addr, "API server listening");

    let task = tokio::spawn(async move {
        let shutdown = {
            let lifecycle = lifecycle.clone();
            async move { lifecycle.stopped().await }
        };
        if let Err(error) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!(%error, "API server failed");
            lifecycle.shutdown("api server failed").await;
        }
    });

    Ok(ModeHandle {
        task,
        local_addr: Some(local_addr),
    })
}

async fn start_worker(
    container: &Container,
    lifecycle: Arc<Lifecycle>,
) -> anyhow::Result<ModeHandle> {
    let resolver: Arc<TenantResolver> = container.resolve(tokens::TENANT_RESOLVER).await?;
    let queue = optional_resolve::<Arc<dyn JobQueue>>(container, tokens::JOB_QUEUE).await?;
    let container = container.clone();

    let task = tokio::spawn(async move {
        let Some(queue) = queue else {
            info!("no job queue registered, worker idle until shutdown");
            lifecycle.stopped().await;
            return;
        };

        loop {
            tokio::select! {
                _ = lifecycle.stopped() => break,
                job = queue.next_job() => {
                    let Some(job) = job else {
                        info!("job queue closed");
                        lifecycle.shutdown("job queue closed").await;
                        break;
                    };
                    if let Err(error) = run_job(&container, &resolver, job).await {
                        warn!(error = %format!("{error:#}"), "job failed");
                    }
                }
            }
        }
    });

    Ok(ModeHandle {
        task,
        local_addr: None,
    })
}

async fn run_job(
    container: &Container,
    resolver: &TenantResolver,
    job: JobPayload,
) -> anyhow::Result<()> {
    let scope = container.create_scope();
    let request = RequestContext::new(Uuid::new_v4().to_string(), "JOB", job.kind.clone());
    let tenant = resolver.resolve_job(&job.tenant)?;
    let auth = AuthContext::anonymous(&tenant);
    let handler = scope
        .resolve::<Arc<dyn JobHandler>>(tokens::JOB_HANDLER)
        .await?;

    let ctx = HandlerContext {
        scope: scope.clone(),
        request,
        tenant,
        auth,
    };
    handler.handle(ctx, job).await
}

async fn start_scheduler(
    container: &Container,
    lifecycle: Arc<Lifecycle>,
    config: Arc<PlatformConfig>,
) -> anyhow::Result<ModeHandle> {
    let resolver: Arc<TenantResolver> = container.resolve(tokens::TENANT_RESOLVER).await?;
    let handler = optional_resolve::<Arc<dyn TickHandler>>(container, tokens::TICK_HANDLER).await?;
    let container = container.clone();
    let period = Duration::from_secs(config.scheduler.tick_secs.max(1));

    let task = tokio::spawn(async move {
        let Some(handler) = handler else {
            info!("no tick handler registered, scheduler idle until shutdown");
            lifecycle.stopped().await;
            return;
        };

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = lifecycle.stopped() => break,
                _ = interval.tick() => {
                    if let Err(error) = run_tick(&container, &resolver, &handler).await {
                        warn!(error = %format!("{error:#}"), "scheduled tick failed");
                    }
                }
            }
        }
    });

    Ok(ModeHandle {
        task,
        local_addr: None,
    })
}

async fn run_tick(
    container: &Container,
    resolver: &TenantResolver,
    handler: &Arc<dyn TickHandler>,
) -> anyhow::Result<()> {
    let scope = container.create_scope();
    let request = RequestContext::new(Uuid::new_v4().to_string(), "TICK", "scheduler");
    let tenant = resolver.resolve_job(&JobTenantSelector::default())?;
    let auth = AuthContext::anonymous(&tenant);

    let ctx = HandlerContext {
        scope,
        request,
        tenant,
        auth,
    };
    handler.tick(ctx).await
}

/// Resolves an optional collaborator: absence is fine, other failures are not.
async fn optional_resolve<T>(container: &Container, token: crate::container::Token) -> anyhow::Result<Option<T>>
where
    T: Clone + Send + Sync + 'static,
{
    match container.resolve::<T>(token).await {
        Ok(value) => Ok(Some(value)),
        Err(ContainerError::UnknownToken { .. }) => Ok(None),
        Err(error) => Err(error.into()),
    }
}
