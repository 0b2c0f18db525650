//! Bootstrap sequencing.
//!
//! Startup is a strictly ordered sequence with no branching back:
//!
//! ```text
//! start -> config loaded -> container created -> defaults registered
//!       -> signals installed -> modules loaded -> mode started
//! ```
//!
//! Any stage failure is caught at the top level, logged with its stable
//! code, best-effort audited (audit failures at boot are swallowed by the
//! writer), and returned as a [`BootError`] for the binary to map to a
//! process exit code via [`exit_codes::classify`].
//!
//! The configuration stage also resolves every client secret reference and
//! validates the configured default realm/tenant/org triple through the same
//! validator used per request, so misconfiguration fails the boot with the
//! specific exit code rather than surfacing on the first request.

pub mod exit_codes;
pub mod modules;
pub mod runtime;
pub mod signals;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use atrium_core::config::PlatformConfig;
use atrium_core::error::{ConfigError, TenantContextError};
use atrium_core::secrets::{EnvSecretResolver, SecretResolver};
use thiserror::Error;
use tracing::{error, info};

use crate::audit::{AuditEvent, AuditKind, AuditWriter, LogAuditWriter};
use crate::auth::AuthPipeline;
use crate::container::{Container, ContainerError};
use crate::lifecycle::Lifecycle;
use crate::tenant::{validate_and_build, TenantResolver};
use crate::tokens;

pub use exit_codes::classify;
pub use modules::KernelModule;
pub use runtime::{
    JobHandler, JobPayload, JobQueue, ModeHandle, RuntimeMode, TickHandler,
};
pub use signals::install_signal_handlers;

/// The ordered bootstrap stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    /// Sequencer entered.
    Start,
    /// Configuration loaded, secrets verified, default triple validated.
    ConfigLoaded,
    /// Root container and lifecycle constructed.
    ContainerCreated,
    /// Kernel defaults registered on the container.
    DefaultsRegistered,
    /// Signal handlers installed.
    SignalsInstalled,
    /// Feature modules registered and contributed.
    ModulesLoaded,
    /// The selected runtime mode started.
    ModeStarted,
}

impl fmt::Display for BootStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootStage::Start => "start",
            BootStage::ConfigLoaded => "config-loaded",
            BootStage::ContainerCreated => "container-created",
            BootStage::DefaultsRegistered => "defaults-registered",
            BootStage::SignalsInstalled => "signals-installed",
            BootStage::ModulesLoaded => "modules-loaded",
            BootStage::ModeStarted => "mode-started",
        };
        f.write_str(name)
    }
}

/// Failure classes a bootstrap stage can raise.
#[derive(Error, Debug)]
pub enum BootFailure {
    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured default realm/tenant/org triple is invalid.
    #[error(transparent)]
    TenantContext(#[from] TenantContextError),

    /// Container wiring failed.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// Anything else (module loading, socket binding).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A bootstrap failure, tagged with the stage that was being entered.
#[derive(Error, Debug)]
#[error("bootstrap failed entering stage {stage}: {source}")]
pub struct BootError {
    /// The stage that failed.
    pub stage: BootStage,
    /// The underlying failure.
    #[source]
    pub source: BootFailure,
}

impl BootError {
    fn at(stage: BootStage, source: BootFailure) -> Self {
        Self { stage, source }
    }

    /// Returns the stable machine-readable code of the underlying failure.
    pub fn code(&self) -> &'static str {
        match &self.source {
            BootFailure::Config(error) => error.code(),
            BootFailure::TenantContext(error) => error.code(),
            BootFailure::Container(error) => error.code(),
            BootFailure::Other(_) => "bootstrap_error",
        }
    }
}

/// Options for one bootstrap run.
pub struct BootOptions {
    config_path: PathBuf,
    mode: RuntimeMode,
    secrets: Arc<dyn SecretResolver>,
    audit: Arc<dyn AuditWriter>,
    modules: Vec<Arc<dyn KernelModule>>,
}

impl BootOptions {
    /// Creates options with the default secret resolver (environment-backed)
    /// and audit writer (log-backed).
    pub fn new(config_path: impl Into<PathBuf>, mode: RuntimeMode) -> Self {
        Self {
            config_path: config_path.into(),
            mode,
            secrets: Arc::new(EnvSecretResolver::new()),
            audit: Arc::new(LogAuditWriter::new()),
            modules: Vec::new(),
        }
    }

    /// Replaces the secret resolver.
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretResolver>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Replaces the audit writer.
    pub fn with_audit(mut self, audit: Arc<dyn AuditWriter>) -> Self {
        self.audit = audit;
        self
    }

    /// Appends a feature module.
    pub fn with_module(mut self, module: Arc<dyn KernelModule>) -> Self {
        self.modules.push(module);
        self
    }
}

/// A successfully booted kernel.
pub struct BootedKernel {
    /// The root container.
    pub container: Container,
    /// The process lifecycle.
    pub lifecycle: Arc<Lifecycle>,
    /// The loaded configuration.
    pub config: Arc<PlatformConfig>,
    /// Bound address, for the API mode.
    pub local_addr: Option<std::net::SocketAddr>,
    task: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for BootedKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootedKernel")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl BootedKernel {
    /// Begins shutdown.
    pub async fn shutdown(&self, reason: &str) {
        self.lifecycle.shutdown(reason).await;
    }

    /// Waits until the runtime mode has stopped.
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

/// Runs the bootstrap sequence.
///
/// On failure the stage and stable code are logged, a boot-failure audit
/// event is written best-effort, and the error is returned for the caller to
/// classify into a process exit code.
pub async fn run(options: BootOptions) -> Result<BootedKernel, BootError> {
    let audit = options.audit.clone();
    let mode = options.mode;

    match run_stages(options).await {
        Ok(kernel) => {
            info!(mode = %mode, "bootstrap complete");
            Ok(kernel)
        }
        Err(boot_error) => {
            error!(
                stage = %boot_error.stage,
                code = boot_error.code(),
                error = %format!("{boot_error:#}"),
                "bootstrap failed"
            );
            audit
                .write(AuditEvent::new(
                    AuditKind::BootFailed,
                    serde_json::json!({
                        "stage": boot_error.stage.to_string(),
                        "code": boot_error.code(),
                    }),
                ))
                .await;
            Err(boot_error)
        }
    }
}

async fn run_stages(options: BootOptions) -> Result<BootedKernel, BootError> {
    let BootOptions {
        config_path,
        mode,
        secrets,
        audit,
        modules,
    } = options;

    let config = PlatformConfig::load(&config_path)
        .map_err(|e| BootError::at(BootStage::ConfigLoaded, e.into()))?;
    let config = Arc::new(config);
    verify_secret_references(&config, secrets.as_ref())
        .await
        .map_err(|e| BootError::at(BootStage::ConfigLoaded, e.into()))?;
    validate_default_triple(&config)
        .map_err(|e| BootError::at(BootStage::ConfigLoaded, e.into()))?;
    info!(
        env = ?config.env,
        realms = config.iam.realms.len(),
        "configuration loaded"
    );

    let container = Container::new();
    let lifecycle = Arc::new(Lifecycle::new(Duration::from_secs(
        config.server.shutdown_timeout_secs,
    )));
    info!("container created");

    register_kernel_defaults(&container, &lifecycle, config.clone(), secrets, audit)
        .map_err(|e| BootError::at(BootStage::DefaultsRegistered, e.into()))?;
    info!("kernel defaults registered");

    let installed = install_signal_handlers(lifecycle.clone());
    info!(installed, "signal handlers stage complete");

    for module in &modules {
        module
            .register(&container)
            .map_err(|e| BootError::at(BootStage::ModulesLoaded, e.into()))?;
        info!(module = module.name(), "module registered");
    }
    for module in &modules {
        module
            .contribute(&container)
            .await
            .map_err(|e| BootError::at(BootStage::ModulesLoaded, e.into()))?;
        info!(module = module.name(), "module contributed");
    }

    let handle = runtime::start(mode, &container, lifecycle.clone(), config.clone())
        .await
        .map_err(|e| BootError::at(BootStage::ModeStarted, e.into()))?;

    Ok(BootedKernel {
        container,
        lifecycle,
        config,
        local_addr: handle.local_addr,
        task: handle.task,
    })
}

/// Resolves every client secret reference named in configuration.
async fn verify_secret_references(
    config: &PlatformConfig,
    secrets: &dyn SecretResolver,
) -> Result<(), ConfigError> {
    for realm in config.iam.realms.values() {
        let Some(reference) = &realm.iam.client_secret_ref else {
            continue;
        };
        let resolved = secrets
            .resolve(reference)
            .await
            .ok()
            .flatten();
        if resolved.is_none() {
            return Err(ConfigError::MissingSecret {
                reference: reference.clone(),
            });
        }
    }
    Ok(())
}

/// Validates the configured default realm/tenant/org triple.
fn validate_default_triple(config: &PlatformConfig) -> Result<(), TenantContextError> {
    validate_and_build(
        config,
        &config.iam.default_realm_key,
        config.iam.default_tenant_key.as_deref(),
        config.iam.default_org_key.as_deref(),
    )
    .map(|_| ())
}

fn register_kernel_defaults(
    container: &Container,
    lifecycle: &Arc<Lifecycle>,
    config: Arc<PlatformConfig>,
    secrets: Arc<dyn SecretResolver>,
    audit: Arc<dyn AuditWriter>,
) -> Result<(), ContainerError> {
    container.register_value(tokens::CONFIG, config.clone())?;
    container.register_value(tokens::SECRETS, secrets.clone())?;
    container.register_value(tokens::AUDIT, audit.clone())?;

    let resolver = Arc::new(TenantResolver::new(config.clone()));
    container.register_value(tokens::TENANT_RESOLVER, resolver)?;

    let pipeline = Arc::new(AuthPipeline::new(config, secrets, audit.clone()));
    container.register_value(tokens::AUTH_PIPELINE, pipeline)?;

    // Registered first so it runs last: the final audit event of a clean
    // shutdown.
    lifecycle.on_shutdown("audit-shutdown-event", move || async move {
        audit
            .write(AuditEvent::new(AuditKind::Shutdown, serde_json::json!({})))
            .await;
        Ok(())
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_names() {
        assert_eq!(BootStage::Start.to_string(), "start");
        assert_eq!(BootStage::ConfigLoaded.to_string(), "config-loaded");
        assert_eq!(BootStage::ModeStarted.to_string(), "mode-started");
    }

    #[test]
    fn test_boot_error_code_delegates_to_source() {
        let config_error = BootError::at(
            BootStage::ConfigLoaded,
            BootFailure::Config(ConfigError::Schema {
                message: "bad".to_string(),
            }),
        );
        assert_eq!(config_error.code(), "config_schema_error");

        let other = BootError::at(
            BootStage::ModeStarted,
            BootFailure::Other(anyhow::anyhow!("bind failed")),
        );
        assert_eq!(other.code(), "bootstrap_error");
    }
}
