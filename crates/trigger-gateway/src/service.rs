//! Trigger gateway service - binds the public and admin listeners.

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::domain::{SecretState, TokenValidator, TriggerLedger};
use crate::handler::TriggerHandler;
use crate::middleware::{cleanup_task, TriggerMetrics};
use crate::ports::PrivilegedOperation;
use crate::router::{build_admin_router, build_public_router, AppState};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const BUCKET_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
const BUCKET_MAX_AGE: Duration = Duration::from_secs(600);

/// Trigger gateway service state
pub struct TriggerGatewayService {
    config: GatewayConfig,
    state: AppState,
    shutdown_tx: Option<watch::Sender<bool>>,
    servers: Vec<JoinHandle<()>>,
    cleanup: Option<JoinHandle<()>>,
    http_addr: Option<SocketAddr>,
    admin_addr: Option<SocketAddr>,
}

impl TriggerGatewayService {
    /// Create the service. The secret is read-only from here on.
    pub fn new(
        config: GatewayConfig,
        secret: SecretState,
        operation: Arc<dyn PrivilegedOperation>,
    ) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let validator = Arc::new(TokenValidator::new(secret));
        if !validator.is_armed() {
            warn!("Starting without a trigger secret; every trigger request will be rejected");
        }

        let metrics = Arc::new(TriggerMetrics::new());
        let ledger = Arc::new(TriggerLedger::new(config.ledger.capacity));
        let operation_name = operation.name().to_string();

        let handler = TriggerHandler::new(
            validator,
            operation,
            Arc::clone(&metrics),
            Arc::clone(&ledger),
        );

        let state = AppState {
            api: Arc::new(handler),
            operation: operation_name,
            metrics,
            ledger,
        };

        Ok(Self {
            config,
            state,
            shutdown_tx: None,
            servers: Vec::new(),
            cleanup: None,
            http_addr: None,
            admin_addr: None,
        })
    }

    /// Bind the listeners and serve in background tasks.
    pub async fn start(&mut self) -> Result<(), GatewayError> {
        if self.shutdown_tx.is_some() {
            return Err(GatewayError::Internal("service already started".into()));
        }

        info!(operation = %self.state.operation, "Starting trigger gateway...");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (public_router, rate_limit) = build_public_router(self.state.clone(), &self.config);

        if self.config.http.enabled {
            let addr = self.config.http_addr();
            let (local, handle) = serve(addr, public_router, shutdown_rx.clone(), "HTTP").await?;
            self.http_addr = Some(local);
            self.servers.push(handle);
        }

        if self.config.admin.enabled {
            let addr = self.config.admin_addr();
            let router = build_admin_router(self.state.clone());
            let (local, handle) = serve(addr, router, shutdown_rx, "Admin").await?;
            self.admin_addr = Some(local);
            self.servers.push(handle);
        }

        let state = rate_limit.state();
        self.cleanup = Some(tokio::spawn(cleanup_task(
            state,
            BUCKET_CLEANUP_INTERVAL,
            BUCKET_MAX_AGE,
        )));

        self.shutdown_tx = Some(shutdown_tx);
        info!("Trigger gateway started successfully");
        Ok(())
    }

    /// Graceful shutdown: stop accepting, drain in-flight requests.
    pub async fn shutdown(&mut self) {
        let Some(tx) = self.shutdown_tx.take() else {
            return;
        };

        info!("Shutting down trigger gateway...");
        let _ = tx.send(true);

        for handle in self.servers.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "Server task panicked");
            }
        }

        if let Some(cleanup) = self.cleanup.take() {
            cleanup.abort();
        }

        info!("Trigger gateway stopped");
    }

    /// Bound public address (resolves port 0)
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// Bound admin address (resolves port 0)
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_addr
    }

    pub fn metrics(&self) -> Arc<TriggerMetrics> {
        Arc::clone(&self.state.metrics)
    }

    pub fn ledger(&self) -> Arc<TriggerLedger> {
        Arc::clone(&self.state.ledger)
    }
}

async fn serve(
    addr: SocketAddr,
    router: Router,
    mut shutdown_rx: watch::Receiver<bool>,
    label: &'static str,
) -> Result<(SocketAddr, JoinHandle<()>), GatewayError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Bind(format!("{}: {}", addr, e)))?;
    let local = listener
        .local_addr()
        .map_err(|e| GatewayError::Bind(e.to_string()))?;

    info!(addr = %local, server = label, "Listening");

    let handle = tokio::spawn(async move {
        let result = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        })
        .await;

        if let Err(e) = result {
            error!(error = %e, server = label, "Server error");
        }
    });

    Ok((local, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Invocation, OperationError};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl PrivilegedOperation for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        async fn invoke(&self) -> Result<Invocation, OperationError> {
            Ok(Invocation::default())
        }
    }

    fn local_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.http.host = [127, 0, 0, 1].into();
        config.http.port = 0;
        config.admin.port = 0;
        config.operation.workflow_dispatch.owner = "octo".into();
        config.operation.workflow_dispatch.repo = "job-search".into();
        config
    }

    #[test]
    fn test_config_validation() {
        let mut config = GatewayConfig::default();
        config.http.port = 9000;
        config.admin.port = 9000;

        let result = TriggerGatewayService::new(config, SecretState::Unavailable, Arc::new(Noop));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let secret = SecretState::from_value(Some("job-search-2025".into()));
        let mut service = TriggerGatewayService::new(local_config(), secret, Arc::new(Noop)).unwrap();

        service.start().await.unwrap();
        let http = service.http_addr().unwrap();
        let admin = service.admin_addr().unwrap();
        assert_ne!(http.port(), 0);
        assert_ne!(admin.port(), 0);

        let response = reqwest::Client::new()
            .post(format!("http://{}/trigger", http))
            .bearer_auth("job-search-2025")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 202);
        assert_eq!(service.metrics().triggered_count(), 1);

        let history: serde_json::Value = reqwest::get(format!("http://{}/history", admin))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let client_ip = history["records"][0]["client_ip"].as_str().unwrap();
        assert_eq!(client_ip, "127.0.0.1");

        service.shutdown().await;
        assert!(reqwest::get(format!("http://{}/health", http)).await.is_err());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut service =
            TriggerGatewayService::new(local_config(), SecretState::Unavailable, Arc::new(Noop))
                .unwrap();
        service.start().await.unwrap();
        assert!(service.start().await.is_err());
        service.shutdown().await;
    }
}
