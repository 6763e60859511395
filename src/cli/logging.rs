//! cli::logging
//!
//! `tracing` subscriber setup.
//!
//! Logging starts before the command line can be parsed (discovery and
//! compilation log too), so the filter sits behind a reload layer and is
//! narrowed or widened once `--debug` / `--quiet` are known. An explicit
//! `RUST_LOG` always wins and is never replaced.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, Registry};

use crate::ui::output::Verbosity;

/// Adjusts the log filter after startup.
pub struct LogHandle {
    reload: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogHandle {
    /// Switch to the default filter for `verbosity`, unless `RUST_LOG` is set.
    pub fn set_verbosity(&self, verbosity: Verbosity) {
        let Some(handle) = &self.reload else {
            return;
        };
        if let Err(e) = handle.reload(EnvFilter::new(verbosity.log_directive())) {
            eprintln!("warning: failed to update log filter: {}", e);
        }
    }
}

/// Install the stderr subscriber.
///
/// Calling this twice leaves the first subscriber in place.
pub fn init() -> LogHandle {
    let from_env = EnvFilter::try_from_default_env().ok();
    let explicit = from_env.is_some();
    let filter =
        from_env.unwrap_or_else(|| EnvFilter::new(Verbosity::Normal.log_directive()));
    let (filter, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .try_init()
        .is_ok();

    LogHandle {
        reload: (installed && !explicit).then_some(handle),
    }
}
