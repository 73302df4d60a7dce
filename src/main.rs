use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use bangserver::{logging, Config, Directory, Server};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = Config::parse();
    logging::init(&config.log_level);

    let directory = match Directory::load(&config.bang_files) {
        Ok(directory) => directory,
        Err(e) => {
            error!(error = %e, "failed to load bangs");
            return ExitCode::FAILURE;
        }
    };
    info!(bangs = directory.len(), "bang directory loaded");

    let server = match Server::bind(&config, directory) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, addr = %config.addr(), "failed to start");
            return ExitCode::FAILURE;
        }
    };

    server.run_until(shutdown_signal()).await;
    info!("server shutdown complete");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
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
                warn!(error = %e, "failed to install SIGTERM handler");
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
    info!("shutdown signal received, stopping server");
}
