//! cli::args
//!
//! Global flags, shared by every command.
//!
//! The command set is only known after discovery, so these flags are added
//! to the console's clap tree with [`clap::Args::augment_args`] instead of a
//! derived `Parser`. They are not `global`: they go before the command name
//! and never clash with a command's own options.
//!
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output; implies `--no-interactive`
//! - `--interactive` / `--no-interactive`: Control prompts

use std::io::IsTerminal;

use clap::Args;

use crate::core::config::Config;
use crate::ui::output::Verbosity;

/// Flags accepted before the command name.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalArgs {
    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Minimal output; implies --no-interactive
    #[arg(short, long)]
    pub quiet: bool,

    /// Always ask for missing prompt values
    #[arg(long = "interactive", conflicts_with = "no_interactive")]
    pub interactive_flag: bool,

    /// Never ask; missing prompt values are errors
    #[arg(long)]
    pub no_interactive: bool,
}

impl GlobalArgs {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }

    /// Whether prompts may ask.
    ///
    /// `--interactive` wins; `--no-interactive` and `--quiet` disable;
    /// otherwise the config value applies and stdin must be a terminal.
    pub fn interactive(&self, config: &Config) -> bool {
        if self.interactive_flag {
            true
        } else if self.no_interactive || self.quiet {
            false
        } else {
            config.interactive() && std::io::stdin().is_terminal()
        }
    }
}
