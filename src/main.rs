//! shard-session binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use shard_session::{api, cli, config::Config, logging, SessionManager};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logging
    let _ = logging::try_init_with_level(config.log_filter());

    info!("shard-session v{}", env!("CARGO_PKG_VERSION"));

    let server_config = match config.to_server_config() {
        Ok(server_config) => server_config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let manager = match SessionManager::install(config.session.clone()) {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            error!(error = %e, "failed to install session store");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = api::serve(server_config, manager).await {
        error!(error = %e, "server stopped with error");
        return ExitCode::FAILURE;
    }

    info!("shard-session stopped");
    ExitCode::SUCCESS
}
