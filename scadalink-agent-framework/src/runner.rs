//! Agent runner for lifecycle management.

use std::future::Future;

use tokio::signal;
use tokio::sync::watch;

use scadalink_common::init_tracing;

use crate::AgentArgs;
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};

/// Agent runner that manages the lifecycle of a field agent.
///
/// Handles:
/// - Logging initialization (with optional CLI level override)
/// - Shutdown signalling on Ctrl+C / SIGTERM through a watch channel
/// - Running the agent's worker until it returns
///
/// The worker runs on the current task, so it does not need to be `Send`,
/// and it is never aborted: it observes the shutdown flag and winds down
/// on its own, which lets it flush in-flight data first.
///
/// # Example
///
/// ```ignore
/// use scadalink_agent_framework::{AgentArgs, AgentConfig, AgentRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = AgentArgs::parse_for("myagent", "agent.json5");
///     let config = MyAgentConfig::load(&args.config)?;
///
///     let runner = AgentRunner::new("myagent", config, &args)?;
///     runner.run(|config, shutdown| my_loop(config, shutdown)).await?;
///     Ok(())
/// }
/// ```
pub struct AgentRunner<C: AgentConfig> {
    /// Agent name for logging.
    name: String,
    /// The loaded configuration.
    config: C,
}

impl<C: AgentConfig> AgentRunner<C> {
    /// Create a runner and initialize logging from the config, with any
    /// `--log-level` override applied.
    pub fn new(name: impl Into<String>, config: C, args: &AgentArgs) -> Result<Self> {
        let name = name.into();

        init_tracing(&args.logging(config.logging()))
            .map_err(|e| AgentError::config(e.to_string()))?;

        tracing::info!(agent = %name, version = env!("CARGO_PKG_VERSION"), "Starting agent");

        Ok(Self { name, config })
    }

    /// Run the worker until it returns.
    ///
    /// A background task flips the shutdown flag when a termination signal
    /// arrives. Worker errors are returned to the caller.
    pub async fn run<F, Fut>(self, worker: F) -> Result<()>
    where
        F: FnOnce(C, watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let signal_task = tokio::spawn(async move {
            wait_for_signal().await;
            let _ = shutdown_tx.send(true);
        });

        tracing::info!(agent = %self.name, "Agent running. Press Ctrl+C to stop.");

        let result = worker(self.config, shutdown_rx).await;
        signal_task.abort();

        match &result {
            Ok(()) => tracing::info!(agent = %self.name, "Agent stopped"),
            Err(e) => tracing::error!(agent = %self.name, error = %e, "Agent stopped with error"),
        }

        result
    }
}

/// Wait for Ctrl+C or, on Unix, SIGTERM.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}

/// Convenience function to run an agent with minimal boilerplate.
///
/// Parses CLI arguments, loads and validates the configuration, initializes
/// logging, then runs `worker` until it returns.
pub async fn run_agent<C, F, Fut>(
    name: &'static str,
    default_config: &'static str,
    worker: F,
) -> anyhow::Result<()>
where
    C: AgentConfig,
    F: FnOnce(C, watch::Receiver<bool>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let args = AgentArgs::parse_for(name, default_config);
    let config = C::load(&args.config)
        .map_err(|e| anyhow::anyhow!("Failed to load config from {:?}: {}", args.config, e))?;

    let runner = AgentRunner::new(name, config, &args)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    runner.run(worker).await.map_err(|e| anyhow::anyhow!("{}", e))
}
