//! Log setup: filtered events to stderr, plus an append-only `logs.txt` under the
//! app root.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::sync::Mutex;

use sitepack_core::Layout;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_ENV: &str = "SITEPACK_LOG";

fn open_log_file(layout: &Layout) -> io::Result<File> {
    fs::create_dir_all(layout.root())?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(layout.log_path())
}

/// SITEPACK_LOG (env-filter syntax) wins; otherwise `info`, or `warn` when quiet.
pub fn init(layout: &Layout, quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(filter);

    let file_layer = match open_log_file(layout) {
        Ok(file) => Some(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(LevelFilter::INFO),
        ),
        Err(e) => {
            eprintln!("warning: cannot open {}: {}", layout.log_path().display(), e);
            None
        }
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}
