//! console::builtin
//!
//! Commands every console provides: `list` and `completion`.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use clap::{Arg, ArgMatches, Command};
use clap_complete::{generate, Shell};

use super::Console;
use crate::core::io::Output;

pub const LIST: &str = "list";
pub const COMPLETION: &str = "completion";

/// Built-in names, in help order.
pub const NAMES: &[&str] = &[LIST, COMPLETION];

/// clap definition of a built-in.
pub fn command(name: &'static str) -> Command {
    match name {
        COMPLETION => Command::new(COMPLETION)
            .about("Generate a shell completion script")
            .arg(
                Arg::new("shell")
                    .required(true)
                    .value_parser(clap::value_parser!(Shell)),
            ),
        _ => Command::new(LIST).about("List commands grouped by namespace"),
    }
}

/// Run a built-in.
pub fn run(console: &Console, name: &str, matches: &ArgMatches, output: &mut Output) -> Result<i32> {
    match name {
        LIST => {
            output.line(render_list(console))?;
            Ok(0)
        }
        COMPLETION => {
            let Some(shell) = matches.get_one::<Shell>("shell").copied() else {
                bail!("missing shell");
            };
            let mut cmd = console.build()?;
            let mut script = Vec::new();
            generate(shell, &mut cmd, console.bin_name(), &mut script);
            output.line(String::from_utf8_lossy(&script).trim_end())?;
            Ok(0)
        }
        other => bail!("unknown command '{}'", other),
    }
}

/// Commands without a namespace first, then one block per namespace.
/// Names are sorted within each block.
pub fn render_list(console: &Console) -> String {
    let mut entries: Vec<(String, String)> = console
        .registrations()
        .iter()
        .map(|r| (r.name().to_string(), r.description().to_string()))
        .collect();
    for name in console.builtins() {
        let about = command(name)
            .get_about()
            .map(|a| a.to_string())
            .unwrap_or_default();
        entries.push((name.to_string(), about));
    }

    let width = entries.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let mut groups: BTreeMap<&str, Vec<&(String, String)>> = BTreeMap::new();
    for entry in &entries {
        let namespace = entry.0.split_once(':').map(|(ns, _)| ns).unwrap_or("");
        groups.entry(namespace).or_default().push(entry);
    }

    let mut lines = vec!["Available commands:".to_string()];
    for (namespace, mut group) in groups {
        group.sort_by(|a, b| a.0.cmp(&b.0));
        if !namespace.is_empty() {
            lines.push(format!(" {}", namespace));
        }
        for (name, description) in group {
            lines.push(
                format!("  {:width$}  {}", name, description, width = width)
                    .trim_end()
                    .to_string(),
            );
        }
    }
    lines.join("\n")
}
