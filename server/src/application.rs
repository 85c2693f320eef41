// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use adc_secrets_engine::backend::Backend;
use adc_secrets_engine::client::NitroClient;
use adc_secrets_engine::context::RequestContext;
use adc_secrets_engine::password::PolicyPasswordGenerator;
use adc_secrets_engine::storage::{InMemoryStorage, Storage};
use anyhow::Context;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::serve::Serve;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::configuration::ServerOptions;
use crate::constants::MAX_BODY_SIZE;
use crate::models::PasswordPolicyFile;
use crate::routes;
use crate::storage::FileStorage;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<Backend>,
    pub shutdown: CancellationToken,
    pub request_timeout: Duration,
}

pub struct Application {
    port: u16,
    server: Serve<TcpListener, Router, Router>,
    backend: Arc<Backend>,
    shutdown: CancellationToken,
    options: ServerOptions,
}

impl Application {
    pub async fn build(options: ServerOptions) -> anyhow::Result<Self> {
        let backend = Arc::new(build_backend(&options).await?);
        let shutdown = CancellationToken::new();

        let address = format!("{}:{}", options.host, options.port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("unable to bind {address}"))?;
        let server = run(listener, &options, backend.clone(), shutdown.clone())?;
        let port = server.local_addr()?.port();

        tracing::info!("[server] listening at http://{}:{}", options.host, port);

        Ok(Self {
            port,
            server,
            backend,
            shutdown,
            options,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    /// Starts the credential cache sweep and the WAL rollback sweep.
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let cleanup_interval = self.options.cache_cleanup_interval();
        tracing::info!(
            "[server] sweeping credential cache every {:#?}",
            cleanup_interval
        );
        let cache_task = self.backend.cache().spawn_cleanup(cleanup_interval);

        let rollback_task = spawn_wal_rollback(
            self.backend.clone(),
            self.shutdown.clone(),
            self.options.wal_rollback_interval(),
            self.options.wal_rollback_min_age(),
        );

        vec![cache_task, rollback_task]
    }

    /// Serves until SIGINT, then cancels in-flight requests and stops.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        let shutdown = self.shutdown.clone();
        self.server
            .with_graceful_shutdown(async move {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::error!("[server] unable to listen for shutdown signal: {}", err);
                    std::future::pending::<()>().await;
                }
                tracing::info!("[server] shutting down");
                shutdown.cancel();
            })
            .await
    }
}

async fn build_backend(options: &ServerOptions) -> anyhow::Result<Backend> {
    let storage: Arc<dyn Storage> = match &options.storage_dir {
        Some(dir) => Arc::new(FileStorage::open(dir).await?),
        None => {
            tracing::warn!("[server] no storage directory set, state is kept in memory");
            Arc::new(InMemoryStorage::new())
        }
    };

    let passwords = match &options.password_policies {
        Some(path) => load_password_policies(path).await?,
        None => PolicyPasswordGenerator::new(),
    };
    tracing::info!(
        "[server] password policies: {:?}",
        passwords.policy_names()
    );

    Ok(Backend::new(
        storage,
        Arc::new(NitroClient::new()),
        Arc::new(passwords),
        options.backend_settings(),
    ))
}

pub async fn load_password_policies(path: &Path) -> anyhow::Result<PolicyPasswordGenerator> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("unable to read {}", path.display()))?;
    let policies: PasswordPolicyFile = serde_json::from_slice(&raw)
        .with_context(|| format!("unable to parse {}", path.display()))?;
    Ok(PolicyPasswordGenerator::with_policies(policies)?)
}

fn spawn_wal_rollback(
    backend: Arc<Backend>,
    shutdown: CancellationToken,
    interval: Duration,
    min_age: Duration,
) -> JoinHandle<()> {
    tracing::info!(
        "[server] reconciling WAL entries older than {:#?} every {:#?}",
        min_age,
        interval
    );
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            let ctx = RequestContext::with_token(shutdown.child_token());
            match backend.rollback_stale_wals(&ctx, min_age).await {
                Ok(0) => tracing::debug!("[server] no WAL entries to reconcile"),
                Ok(resolved) => tracing::info!("[server] reconciled {} WAL entries", resolved),
                Err(err) => tracing::warn!("[server] WAL sweep failed: {}", err),
            }
        }
    })
}

/// Builds the API router with all middleware applied.
pub fn create_router(
    options: &ServerOptions,
    backend: Arc<Backend>,
    shutdown: CancellationToken,
) -> Router {
    let state = Arc::new(AppState {
        backend,
        shutdown,
        request_timeout: options.request_timeout(),
    });

    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/config",
            get(routes::read_config)
                .post(routes::write_config)
                .put(routes::write_config)
                .delete(routes::delete_config),
        )
        .route("/roles", get(routes::list_roles))
        .route(
            "/roles/{name}",
            get(routes::read_role)
                .post(routes::write_role)
                .put(routes::write_role)
                .delete(routes::delete_role),
        )
        .route("/creds/{name}", get(routes::read_creds))
        .route("/rotate-root", post(routes::rotate_root))
        .route("/rotate-role/{name}", post(routes::rotate_role))
        .route("/rotate-roles", post(routes::rotate_roles))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(options.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tracing::instrument(skip(listener, backend, shutdown))]
pub fn run(
    listener: TcpListener,
    options: &ServerOptions,
    backend: Arc<Backend>,
    shutdown: CancellationToken,
) -> Result<Serve<TcpListener, Router, Router>, std::io::Error> {
    let app = create_router(options, backend, shutdown);
    Ok(axum::serve(listener, app))
}
