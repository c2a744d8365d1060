//! Tracing setup.
//!
//! Nothing is installed unless `ETSC_LOG` (or `RUST_LOG`) is set. Output
//! goes to stderr, as text or, with `ETSC_LOG_FORMAT=json`, one JSON
//! object per line.
//!
//! ```bash
//! ETSC_LOG=debug etsc main.ets
//! ETSC_LOG="etsc_checker=trace" ETSC_LOG_FORMAT=json etsc main.ets
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var("ETSC_LOG_FORMAT").unwrap_or_default().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// `ETSC_LOG` wins over `RUST_LOG`.
fn build_filter() -> EnvFilter {
    match std::env::var("ETSC_LOG") {
        Ok(value) => EnvFilter::builder().parse_lossy(value),
        Err(_) => EnvFilter::from_default_env(),
    }
}

pub fn init_tracing() {
    if std::env::var("ETSC_LOG").is_err() && std::env::var("RUST_LOG").is_err() {
        return;
    }
    let filter = build_filter();
    match LogFormat::from_env() {
        LogFormat::Json => {
            let layer = fmt::layer().json().with_writer(std::io::stderr);
            Registry::default().with(filter).with(layer).init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}
