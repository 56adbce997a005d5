mod handlers;
mod router;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::config::Config;
use crate::core::filter::EventFilter;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::runner::BuildLauncher;

pub(crate) use handlers::docs::DocsSite;

const FALLBACK_NOT_FOUND_PAGE: &str =
    "<!DOCTYPE html><html><head><title>404 Not Found</title></head><body><h1>404 Not Found</h1></body></html>";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<Config>,
    pub(crate) filter: Arc<EventFilter>,
    pub(crate) launcher: Arc<dyn BuildLauncher>,
    pub(crate) not_found_page: Arc<str>,
}

impl AppState {
    pub(crate) fn new(
        config: Arc<Config>,
        launcher: Arc<dyn BuildLauncher>,
        not_found_page: Arc<str>,
    ) -> Self {
        let filter = EventFilter::new(config.event_type.clone(), config.target_ref.clone());
        Self {
            config,
            filter: Arc::new(filter),
            launcher,
            not_found_page,
        }
    }
}

/// HTTP listener serving the trigger endpoint and the docs sites.
pub struct HookServer {
    config: Arc<Config>,
    launcher: Arc<dyn BuildLauncher>,
    app: Option<Router>,
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    serve_task: Option<JoinHandle<()>>,
}

impl HookServer {
    pub fn new(config: Arc<Config>, launcher: Arc<dyn BuildLauncher>) -> Self {
        Self {
            config,
            launcher,
            app: None,
            local_addr: None,
            shutdown_tx: None,
            serve_task: None,
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

async fn load_not_found_page(config: &Config) -> Arc<str> {
    match tokio::fs::read_to_string(&config.not_found_page).await {
        Ok(page) => Arc::from(page),
        Err(e) => {
            warn!(
                "couldn't read 404 page {}: {}; using built-in page",
                config.not_found_page.display(),
                e
            );
            Arc::from(FALLBACK_NOT_FOUND_PAGE)
        }
    }
}

#[async_trait]
impl LifecycleComponent for HookServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("Hook server initializing...");
        let page = load_not_found_page(&self.config).await;

        let docs = DocsSite::new(&self.config.docs, &self.config.public_dir, page.clone());
        let book = DocsSite::new(&self.config.book, &self.config.public_dir, page.clone());
        for site in [&docs, &book] {
            site.ensure_dirs()
                .with_context(|| format!("could not create dirs for {}", site.name()))?;
        }

        let state = AppState::new(self.config.clone(), self.launcher.clone(), page);
        self.app = Some(router::build_router(state, docs, book));
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let app = self
            .app
            .take()
            .context("hook server started before it was initialized")?;

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("could not bind {}", addr))?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        info!("serving on port {}", local_addr.port());
        self.serve_task = Some(tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::error!("Hook server crashed: {}", e);
            }
        }));
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("Hook server shutting down...");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.serve_task.take() {
            task.await?;
        }
        Ok(())
    }
}
