use clap::Parser;
use ftp_drop_lib::api::ApiService;
use ftp_drop_lib::config::Cli;
use ftp_drop_lib::logging::init_logging;
use sorng_ftp_drop::dropzone::{DropService, FtpConnector};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Cli::parse().into_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("invalid configuration: {}", e.message);
            return ExitCode::from(2);
        }
    };
    if let Err(e) = init_logging(config.json_logs, config.log_file.as_deref()) {
        eprintln!("cannot set up logging: {}", e);
        return ExitCode::from(2);
    }
    tracing::info!(
        "ftp-drop {} for {}:{} ({:?})",
        env!("CARGO_PKG_VERSION"),
        config.drop.host,
        config.drop.port,
        config.drop.auth_mode
    );
    tracing::debug!("configuration: {:?}", config.drop);

    let connector = FtpConnector::new(config.drop.connection_config());
    let service = DropService::new(Arc::new(config.drop), connector);
    let api = Arc::new(ApiService::new(service, config.max_upload_bytes));

    match api.start_server(config.bind).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("server stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
