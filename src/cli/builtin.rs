//! cli::builtin
//!
//! Commands shipped with the binary.
//!
//! The same handlers are registered in the [`Catalog`] (under `demo:`) and
//! in the [`HandlerTable`] that `*.cmd.toml` manifests bind against, so a
//! manifest can re-tag an existing handler under a new name.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;

use crate::core::descriptor::{tag, Definition, Descriptor};
use crate::core::entry::AnnotationEntry;
use crate::core::io::{Input, Output};
use crate::discovery::{Catalog, HandlerTable};

/// Tag the `audit` plugin reacts to.
pub const AUDITED: &str = "audited";

fn greet(input: &Input, output: &mut Output) -> Result<()> {
    let name = input.argument_text("name").unwrap_or_default();
    for greeting in input.option_list("greeting") {
        output.line(format!("{}, {}!", greeting, name))?;
    }
    Ok(())
}

fn login(input: &Input, output: &mut Output) -> Result<()> {
    let user = input.option_text("user").unwrap_or_default();
    let password = input.option_text("password").unwrap_or_default();
    output.line(format!(
        "logged in as {} ({} character password)",
        user,
        password.chars().count()
    ))?;
    Ok(())
}

fn touch(input: &Input, output: &mut Output) -> Result<()> {
    let worker = input.worker_id().unwrap_or(0);
    let Some(dir) = input.option_text("into").map(PathBuf::from) else {
        output.line(format!("worker {} done", worker))?;
        return Ok(());
    };

    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("worker-{}-{}", worker, std::process::id()));
    fs::write(&path, format!("{}\n", worker))
        .with_context(|| format!("writing {}", path.display()))?;
    output.info(format!("worker {} wrote {}", worker, path.display()))?;
    Ok(())
}

fn hold(input: &Input, output: &mut Output) -> Result<()> {
    let millis: u64 = input
        .option_text("hold")
        .map(|v| v.parse())
        .transpose()
        .context("--hold expects milliseconds")?
        .unwrap_or(0);
    thread::sleep(Duration::from_millis(millis));
    output.line("done")?;
    Ok(())
}

fn audit(target: &dyn Descriptor, input: &Input, output: &mut Output) -> Result<()> {
    tracing::info!(command = input.command(), descriptor = target.id(), "audit");
    output.info(format!("audit: {}", input.command()))?;
    Ok(())
}

/// Handlers manifests may refer to by name.
pub fn handlers() -> HandlerTable {
    let mut table = HandlerTable::new();
    table
        .command("greet", greet)
        .command("login", login)
        .command("touch", touch)
        .command("hold", hold)
        .hook("audit", audit);
    table
}

/// The `demo:` commands and the `audit` plugin.
pub fn catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .add(
            Definition::command("greet", greet)
                .tag(tag::CLI, AnnotationEntry::with_args(["demo:greet", "Greet someone"]))
                .tag(tag::ARGUMENT, AnnotationEntry::with_args(["name", "REQUIRED", "Who to greet"]))
                .tag(
                    tag::OPTION,
                    AnnotationEntry::with_args(["greeting", "VALUE_IS_ARRAY", "Greeting to use"])
                        .named("default", json!(["hi"])),
                )
                .mark(AUDITED),
        )
        .add(
            Definition::command("login", login)
                .tag(tag::CLI, AnnotationEntry::with_args(["demo:login", "Ask for credentials"]))
                .tag(
                    tag::PROMPT,
                    AnnotationEntry::with_args(["user", "User name:"]).named("validate", "non_empty"),
                )
                .tag(
                    tag::PROMPT,
                    AnnotationEntry::with_args(["password", "Password:"]).named("secret", true),
                ),
        )
        .add(
            Definition::command("touch", touch)
                .tag(tag::CLI, AnnotationEntry::with_args(["demo:touch", "Write one file per worker"]))
                .tag(
                    tag::OPTION,
                    AnnotationEntry::with_args(["into", "VALUE_REQUIRED", "Directory to write into"]),
                )
                .mark("spawnable"),
        )
        .add(
            Definition::command("hold", hold)
                .tag(tag::CLI, AnnotationEntry::with_args(["demo:once", "Refuse to run twice at once"]))
                .tag(tag::OPTION, AnnotationEntry::with_args(["hold", "VALUE_OPTIONAL", "Milliseconds to hold the lock"]))
                .mark("once"),
        )
        .add(
            Definition::plugin("audit", audit)
                .tag(tag::CLI_PLUGIN, AnnotationEntry::with_args([AUDITED])),
        );
    catalog
}
