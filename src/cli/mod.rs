//! cli
//!
//! The `cmdtag` binary.
//!
//! # Startup
//!
//! ```text
//! logging -> config -> discovery (catalog + manifests) -> compile
//!   -> console -> parse argv (+ global flags) -> dispatch
//! ```
//!
//! Discovery scans the configured directories plus `$CMDTAG_PATH` for
//! `*.cmd.toml` manifests; the built-in `demo:` commands are always present.
//!
//! A process started with `CMDTAG_WORKER_ID` set is a pool worker: it parses
//! the argv its parent rendered, never prompts and runs the handler directly.

pub mod args;
pub mod builtin;
pub mod logging;

pub use args::GlobalArgs;

use std::ffi::OsString;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, FromArgMatches};

use crate::app::App;
use crate::console::RunContext;
use crate::core::config::Config;
use crate::core::io::Output;
use crate::discovery::{CachedDiscovery, Chain, ManifestDiscovery};
use crate::engine::{current_worker_id, ExecutionWrapper, ProcessSpawner};
use crate::ui::output;
use crate::ui::prompts::TerminalAsker;

/// Run the binary with the process arguments. Returns the exit code.
pub fn run() -> Result<i32> {
    run_with(std::env::args_os().collect())
}

/// Run the binary with explicit arguments (program name first).
pub fn run_with(argv: Vec<OsString>) -> Result<i32> {
    let logging = logging::init();
    let worker_id = current_worker_id();

    let loaded = Config::load()?;
    for warning in &loaded.warnings {
        tracing::warn!(path = %warning.path.display(), "{}", warning.message);
    }
    let config = loaded.config;
    if let Some(path) = config.path() {
        tracing::debug!(path = %path.display(), "loaded config");
    }

    let spawner = ProcessSpawner::from_args(&argv)?;
    let wrapper = ExecutionWrapper::new(Arc::new(TerminalAsker), Arc::new(spawner))
        .with_poll_interval(config.poll_interval())
        .with_lock_dir(config.lock_dir());
    let interrupt = wrapper.interrupt_handle();

    let discovery = Chain::new()
        .with(builtin::catalog())
        .with(CachedDiscovery::new(ManifestDiscovery::new(builtin::handlers())));
    let mut app = App::new(discovery)
        .with_wrapper(wrapper)
        .with_about("Run commands declared by tags");
    for dir in config.directories() {
        app.add_directory(dir);
    }
    let console = app.prepare()?;

    let argv = console.resolve_args(argv)?;
    let matches = match GlobalArgs::augment_args(console.build()?).try_get_matches_from(argv) {
        Ok(matches) => matches,
        Err(e) => {
            e.print()?;
            return Ok(e.exit_code());
        }
    };
    let globals = GlobalArgs::from_arg_matches(&matches)?;
    let verbosity = globals.verbosity();
    logging.set_verbosity(verbosity);

    if worker_id.is_none() {
        let result = ctrlc::set_handler(move || {
            if !interrupt.interrupt() {
                std::process::exit(130);
            }
        });
        if let Err(e) = result {
            output::warn(format!("cannot install Ctrl-C handler: {}", e), verbosity);
        }
    }

    let context = RunContext {
        interactive: worker_id.is_none() && globals.interactive(&config),
        worker_id,
    };
    let mut out = Output::stdout(verbosity);
    console.dispatch(&matches, &mut out, context)
}
