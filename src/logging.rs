//! Subscriber setup for the binary.
//!
//! The library crates log through `log`; the `tracing-log` bridge installed
//! by `init()` forwards those records into the same sinks as the request
//! spans.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub fn default_directives() -> String {
    format!(
        "{}=info,sorng_ftp_drop=info,sorng_ftp=warn,axum::rejection=trace",
        env!("CARGO_CRATE_NAME")
    )
}

/// Install the global subscriber. Call once, before serving.
pub fn init_logging(
    json: bool,
    log_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives().into());

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let json_layer = json.then(|| fmt::layer().json().with_current_span(true));
    let text_layer = (!json).then(|| fmt::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}
