use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use press_core::Builder;
use press_dev_server::{DevServer, DevServerConfig};
use std::sync::Arc;
use tokio::{
    signal,
    sync::{mpsc, watch},
};

use crate::cmd::build::add_build_args;
use crate::config::PressConfig;

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("serve"))
        .about("Serve the site and rebuild it when source files change")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to serve on [default: 3000]")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to [default: 127.0.0.1]"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(clap::ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = PressConfig::load(args)?;
    let serve = config.serve.clone();
    let output = config.site.directories.output.clone();

    let builder = Arc::new(Builder::new(config.site).context("failed to initialize")?);

    log::info!(target: "press", "----> Initial build");
    builder.rebuild().context("could not complete initial build")?;

    let server = DevServer::bind(DevServerConfig {
        host: serve.host,
        port: serve.port,
        root: output,
        open: serve.open,
    })
    .await?;

    log::info!(target: "press", "----> Starting server and watcher");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let signal_tx = shutdown_tx.clone();
    let signal_handle = tokio::spawn(async move {
        shutdown_signal().await;
        log::info!(target: "press", "----> Signal detected: cleaning up...");
        let _ = signal_tx.send(true);
    });

    let server_rx = shutdown_rx.clone();
    let server_tx = shutdown_tx.clone();
    let server_handle = tokio::spawn(async move {
        let mut rx = server_rx;
        let res = server.run(async move { stopped(&mut rx).await }).await;
        // Take the watcher down with the server.
        let _ = server_tx.send(true);
        res
    });

    let watcher_handle = tokio::spawn(watch_sources(builder, shutdown_rx));

    let (server_res, watcher_res) = tokio::join!(server_handle, watcher_handle);
    signal_handle.abort();

    server_res??;
    watcher_res??;

    log::info!(target: "press", "----> DONE");

    Ok(())
}

/// Resolves once shutdown was requested or the sender is gone.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn watch_sources(builder: Arc<Builder>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(100);

    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.blocking_send(res);
    })?;

    for dir in builder.config().source_dirs() {
        watcher
            .watch(dir, RecursiveMode::Recursive)
            .with_context(|| format!("could not watch {}", dir.display()))?;
        log::info!(target: "watcher", "Watching {:?} directory", dir);
    }

    loop {
        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            event = rx.recv() => match event {
                Some(Ok(event)) if triggers_rebuild(&event.kind) => {
                    for path in &event.paths {
                        log::info!(target: "watcher", "{:?} has been modified", path);
                    }
                    rebuild(&builder).await;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => log::warn!(target: "watcher", "error: {}", e),
                None => break,
            },
        }
    }

    log::info!(target: "watcher", "==> Stopped watching files");

    Ok(())
}

fn triggers_rebuild(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Runs a full staged rebuild on the blocking pool. Failures are logged and
/// the previous output keeps being served.
async fn rebuild(builder: &Arc<Builder>) {
    let builder = Arc::clone(builder);
    match tokio::task::spawn_blocking(move || builder.rebuild()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            log::error!(target: "watcher", "error during build: {:#}", anyhow::Error::new(e))
        }
        Err(e) => log::error!(target: "watcher", "build task failed: {}", e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!(target: "press", "failed to install Ctrl+C handler: {}", e);
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
                log::error!(target: "press", "failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
