use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::config::Config;
use crate::core::lifecycle::{LifecycleComponent, LifecycleManager};
use crate::core::runner::{BuildLauncher, ScriptRunner};
use crate::core::terminal;
use crate::interfaces::web::HookServer;
use crate::logging;

fn print_help() {
    println!(
        "hookd: deploy webhook receiver and docs server

Usage: hookd [--port <port>] [--script <path>] [--public-dir <dir>] [--log-level <level>]

Environment:
  SECRET            shared webhook secret (required)
  PORT              listen port (default 3000)
  SCRIPT            script run on push (default ./run.sh)
  TARGET_REF        ref that triggers a build (default refs/heads/master)
  DOCS_URL, BOOK_URL, TRIGGER_URL, DOCS_BASE_URL, BOOK_BASE_URL
  PUBLIC_DIR, NOT_FOUND_PAGE, SHELL_PATH, LOG_LEVEL"
    );
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let mut config = Config::from_env().context("couldn't load configuration")?;
    config
        .apply_flags(&args)
        .context("couldn't parse command line")?;

    logging::init(&config.log_level);
    config.log_summary();

    let config = Arc::new(config);
    let launcher: Arc<dyn BuildLauncher> =
        Arc::new(ScriptRunner::new(&config.shell, &config.script_path));

    let server = Arc::new(Mutex::new(HookServer::new(config.clone(), launcher)));
    let mut lifecycle = LifecycleManager::new();
    lifecycle.attach(server.clone() as Arc<Mutex<dyn LifecycleComponent + Send + Sync>>);
    lifecycle.start().await?;

    let port = server
        .lock()
        .await
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(config.port);
    terminal::print_startup(&config, port);

    tokio::signal::ctrl_c()
        .await
        .context("couldn't listen for shutdown signal")?;
    info!("shutdown requested");
    lifecycle.shutdown().await
}
