//! Dispatcher process lifecycle
//!
//! This module wires the job engine to its infrastructure, runs the periodic
//! dispatcher, and waits for a shutdown signal.

use std::sync::Arc;

use tokio::signal;

use crate::config::settings::Settings;
use crate::db::{establish_async_connection_pool, migrations};
use crate::error::{AppError, AppResult};
use crate::jobs::handlers::default_registry;
use crate::jobs::{Dispatcher, JobOrchestrator, LockManager, PassSummary};
use crate::repositories::JobRepository;

/// Scheduler process manager
pub struct Server {
    settings: Settings,
}

impl Server {
    /// Create a new server with the given settings
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Connect the orchestrator to the database, lock store and report service
    ///
    /// # Errors
    /// - Database connection pool or migration errors
    /// - Lock store connection errors
    /// - Report service client construction errors
    pub async fn build_orchestrator(&self) -> AppResult<JobOrchestrator> {
        for warning in self.settings.warnings() {
            tracing::warn!("{warning}");
        }

        let database = &self.settings.database;

        if database.auto_migrate {
            let applied = migrations::run_pending_migrations(&database.url).await?;
            tracing::info!(applied = applied.len(), "Pending migrations applied");
        }

        tracing::info!("Initializing database connection pool...");
        let pool = establish_async_connection_pool(database).await?;
        tracing::info!("Database connection pool initialized");

        let locks = LockManager::from_config(&self.settings.lock)
            .await
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;

        let registry = default_registry(&self.settings.report_service)?;
        tracing::info!(
            handlers = registry.registered_types().len(),
            report_service = %self.settings.report_service.base_url,
            "Handler registry built"
        );

        Ok(JobOrchestrator::new(
            Arc::new(JobRepository::new(pool)),
            locks,
            Arc::new(registry),
            &self.settings.jobs,
        ))
    }

    /// Run a single dispatch pass
    pub async fn run_once(&self) -> AppResult<PassSummary> {
        let orchestrator = self.build_orchestrator().await?;
        orchestrator.run_pass().await
    }

    /// Start the dispatcher and run until shutdown signal
    ///
    /// Stale RUNNING jobs are reconciled once before the first tick. With
    /// `jobs.enabled = false` the process only waits for the signal.
    pub async fn run(self) -> AppResult<()> {
        self.log_startup();

        if !self.settings.jobs.enabled {
            tracing::warn!("Job dispatch is disabled; waiting for shutdown signal");
            shutdown_signal().await;
            return Ok(());
        }

        let orchestrator = self.build_orchestrator().await?;

        match orchestrator.reconcile_stale_jobs().await {
            Ok(reset) => tracing::info!(reset, "Startup reconciliation complete"),
            Err(e) => tracing::error!(error = %e, "Startup reconciliation failed"),
        }

        let dispatcher =
            Dispatcher::new(orchestrator, &self.settings.jobs.dispatch_schedule).await?;
        dispatcher.start().await?;
        tracing::info!(
            schedule = %self.settings.jobs.dispatch_schedule,
            "Dispatcher running"
        );

        shutdown_signal().await;

        dispatcher.stop().await?;
        tracing::info!("Dispatcher shutdown complete");

        Ok(())
    }

    fn log_startup(&self) {
        tracing::info!(
            app_name = %self.settings.application.name,
            app_version = %self.settings.application.version,
            environment = %self.settings.application.environment,
            "Application starting"
        );

        // The URL carries credentials and is never logged.
        tracing::info!(
            max_connections = self.settings.database.max_connections,
            min_connections = self.settings.database.min_connections,
            connection_timeout = self.settings.database.connection_timeout,
            "Database configuration loaded"
        );

        tracing::info!(
            execution_timeout_secs = self.settings.jobs.execution_timeout_secs,
            max_attempts = self.settings.jobs.max_attempts,
            retry_base_delay_ms = self.settings.jobs.retry_base_delay_ms,
            stale_running_after_secs = self.settings.jobs.stale_running_after_secs,
            "Jobs configuration loaded"
        );

        tracing::info!(
            backend = ?self.settings.lock.backend,
            lease_seconds = self.settings.lock.lease_seconds,
            strict = self.settings.lock.strict,
            "Lock configuration loaded"
        );
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
///
/// A signal handler that cannot be installed is logged and treated as
/// never firing.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
