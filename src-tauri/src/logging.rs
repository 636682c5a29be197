//! Logging with console output, plus a daily file in release builds.
//!
//! Log files go to `<config dir>/cliky/logs/`.

use crate::settings;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "cliky_tauri=info,cliky_core=info,cliky_platform=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn setup(is_production: bool) {
    let console_layer = fmt::layer().with_target(true).with_filter(env_filter());

    let file_layer = if is_production {
        let log_dir = settings::log_dir();
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!("Warning: Failed to create log directory {:?}: {}", log_dir, e);
            None
        } else {
            let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "cliky.log");
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(file_appender)
                    .with_filter(env_filter()),
            )
        }
    } else {
        None
    };

    let registry = tracing_subscriber::registry().with(console_layer);
    let initialized = match file_layer {
        Some(file_layer) => registry.with(file_layer).try_init(),
        None => registry.try_init(),
    };
    if initialized.is_err() {
        return;
    }

    if is_production {
        tracing::info!("File logging enabled: {:?}", settings::log_dir());
    }
    tracing::info!("Logging initialized (production={})", is_production);
}
