//! Main application state and service coordination
//!
//! AppState wires the stores, engine, orchestrator, broker connection, and
//! metrics together and owns the background tasks that keep them running.

use crate::acceptance::AcceptanceTracker;
use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::publisher::{AmqpNotificationChannel, PublisherConfig};
use crate::challenge::ChallengeRegistry;
use crate::config::AppConfig;
use crate::engine::MatchmakingEngine;
use crate::metrics::health::{HealthServer, HealthServerConfig};
use crate::metrics::MetricsCollector;
use crate::notify::NotificationChannel;
use crate::queue::store::InMemoryQueueStore;
use crate::queue::MatchOrchestrator;
use crate::services::{GameService, MockGameService, PlayerDirectory, StaticPlayerDirectory};
use crate::wait_time::WaitTimeEstimator;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    engine: Arc<MatchmakingEngine>,
    orchestrator: Arc<MatchOrchestrator>,
    collector: Arc<MetricsCollector>,
    /// Present only when the service runs against a real broker
    amqp_connection: Option<Arc<AmqpConnection>>,
    background_tasks: Mutex<Vec<JoinHandle<()>>>,
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the service against a live AMQP broker
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing arena matchmaking service");
        info!(
            "Configuration: service={}, amqp_url={}",
            config.service.name, config.amqp.url
        );

        let amqp_config = AmqpConfig::from_url(
            &config.amqp.url,
            config.amqp.max_retry_attempts,
            config.amqp.retry_delay_ms,
        )
        .map_err(|e| ServiceError::Configuration {
            message: format!("Failed to parse AMQP URL: {}", e),
        })?;

        let connection = Arc::new(AmqpConnection::new(&amqp_config).await.map_err(|e| {
            ServiceError::AmqpConnection {
                message: format!("Failed to connect to AMQP: {}", e),
            }
        })?);

        let channel = connection
            .open_channel()
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to open publisher channel: {}", e),
            })?;

        let publisher_config = PublisherConfig {
            exchange_name: config.amqp.exchange_name.clone(),
            max_retries: config.amqp.max_retry_attempts,
            retry_delay_ms: config.amqp.retry_delay_ms,
            enable_deduplication: true,
        };
        let notifier = Arc::new(
            AmqpNotificationChannel::new(channel, publisher_config)
                .await
                .map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to initialize notification publisher: {}", e),
                })?,
        );

        Self::build(config, notifier, Some(connection))
    }

    /// Initialize the service with an in-process notification channel.
    /// Used by tests and deployments without a broker.
    pub fn with_channel(
        config: AppConfig,
        notifier: Arc<dyn NotificationChannel>,
    ) -> Result<Self, ServiceError> {
        Self::build(config, notifier, None)
    }

    fn build(
        config: AppConfig,
        notifier: Arc<dyn NotificationChannel>,
        amqp_connection: Option<Arc<AmqpConnection>>,
    ) -> Result<Self, ServiceError> {
        let collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let store = Arc::new(InMemoryQueueStore::new());
        let acceptance = Arc::new(AcceptanceTracker::new());
        let challenges = Arc::new(ChallengeRegistry::new());
        let estimator = Arc::new(WaitTimeEstimator::new(
            config.default_wait_estimate(),
            config.matchmaking.wait_estimate_min_samples,
        ));

        // Stand-ins until the real game and identity services are wired up
        let games: Arc<dyn GameService> = Arc::new(MockGameService::new());
        let directory: Arc<dyn PlayerDirectory> = Arc::new(StaticPlayerDirectory::open());

        let engine = Arc::new(MatchmakingEngine::new(
            store.clone(),
            acceptance.clone(),
            challenges.clone(),
            games,
            directory,
            notifier.clone(),
            collector.clone(),
            estimator.clone(),
            config.engine_config(),
        ));

        let orchestrator = Arc::new(MatchOrchestrator::new(
            store,
            acceptance,
            challenges,
            notifier,
            collector.clone(),
            estimator,
            config.orchestrator_config(),
        ));

        Ok(Self {
            config,
            engine,
            orchestrator,
            collector,
            amqp_connection,
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start the pairing tick loop
    pub async fn start(&self) -> Result<(), ServiceError> {
        info!("Starting arena matchmaking service");

        *self.is_running.write().await = true;

        let tick_task = self.orchestrator.clone().start();
        self.push_task(tick_task)?;

        info!("Arena matchmaking service started");
        Ok(())
    }

    /// Build and spawn the health/metrics HTTP server backed by this state
    pub fn spawn_health_server(
        self: &Arc<Self>,
    ) -> Result<(Arc<HealthServer>, JoinHandle<()>), ServiceError> {
        let health_config = HealthServerConfig {
            port: self.config.service.health_port,
            host: "0.0.0.0".to_string(),
        };

        let server = Arc::new(
            HealthServer::new(health_config, self.collector.clone())
                .with_app_state(self.clone()),
        );

        let task_server = server.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = task_server.start().await {
                error!("Health server failed: {}", e);
            }
        });

        Ok((server, handle))
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown");

        *self.is_running.write().await = false;

        let tasks = {
            let mut guard = self
                .background_tasks
                .lock()
                .map_err(|_| ServiceError::BackgroundTask {
                    message: "Background task registry lock poisoned".to_string(),
                })?;
            std::mem::take(&mut *guard)
        };
        for task in tasks {
            task.abort();
        }

        let final_stats = self.engine.queue_stats(None, None);
        info!(
            "Final statistics: {} waiting, {} pending matches, {} active challenges",
            final_stats.total_waiting, final_stats.pending_matches, final_stats.active_challenges
        );

        if let Some(connection) = &self.amqp_connection {
            // Connection close consumes, so only attempt when we hold the last Arc
            if Arc::strong_count(connection) == 1 {
                info!("Closing AMQP connection");
            } else {
                warn!("AMQP connection still shared at shutdown");
            }
        }

        info!("Shutdown completed");
        Ok(())
    }

    fn push_task(&self, task: JoinHandle<()>) -> Result<(), ServiceError> {
        self.background_tasks
            .lock()
            .map_err(|_| ServiceError::BackgroundTask {
                message: "Background task registry lock poisoned".to_string(),
            })?
            .push(task);
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> Arc<MatchmakingEngine> {
        self.engine.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MockNotificationChannel;

    #[tokio::test]
    async fn test_app_state_lifecycle() {
        let notifier = Arc::new(MockNotificationChannel::new());
        let state = AppState::with_channel(AppConfig::default(), notifier).unwrap();

        assert!(!state.is_running().await);
        state.start().await.unwrap();
        assert!(state.is_running().await);

        state.shutdown().await.unwrap();
        assert!(!state.is_running().await);
    }

    #[tokio::test]
    async fn test_app_state_exposes_engine() {
        let notifier = Arc::new(MockNotificationChannel::new());
        let state = AppState::with_channel(AppConfig::default(), notifier).unwrap();

        let outcome = state
            .engine()
            .join_queue("a", "coin-flip", 100, None)
            .await
            .unwrap();
        assert_eq!(outcome.position, 1);

        let report = state.engine().queue_stats(None, None);
        assert_eq!(report.total_waiting, 1);
    }
}
