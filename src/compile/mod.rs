//! compile
//!
//! Turns discovered descriptors into fully specified commands.
//!
//! # Pipeline
//!
//! For every descriptor carrying a `cli` tag:
//!
//! ```text
//! argument entries -> option entries -> --workers -> prompt options
//! ```
//!
//! Arguments always precede options so help text lists them first. Each
//! `cli` entry on a descriptor yields its own [`Command`]; all of them share
//! the handler and parameter set. `cli` entries without a name are skipped.
//!
//! # Invariants
//!
//! - Compilation is pure: re-running it recomputes everything from the
//!   descriptors
//! - Parameter names are unique per command
//! - Plugin hooks are resolved once, here, by exact tag name
//!
//! # Modules
//!
//! - [`args`] - `argument` / `option` entries to [`ParamSpec`]s
//! - [`prompts`] - `prompt` entries to [`PromptSpec`]s plus their options
//! - [`workers`] - `spawnable` / `respawn` to [`WorkerPolicy`]
//! - [`plugins`] - `cli_plugin` hooks

pub mod args;
pub mod error;
pub mod plugins;
pub mod prompts;
pub mod workers;

pub use args::ParamSpec;
pub use error::CompileError;
pub use plugins::{PluginCallable, PluginRegistry};
pub use prompts::{PromptSpec, Validator, ValidatorTable};
pub use workers::{WorkerPolicy, WORKERS_OPTION};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::core::descriptor::{tag, Descriptor};
use crate::core::flags::ParamKind;

/// A compiled, registrable command.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub description: String,
    /// Arguments, then options, then `--workers`, then prompt options.
    pub params: Vec<ParamSpec>,
    /// Prompts in declaration order.
    pub prompts: Vec<PromptSpec>,
    pub worker_policy: WorkerPolicy,
    /// Hold a run lock while dispatching.
    pub run_once: bool,
    /// Hooks matched to this command, in registration order.
    pub plugins: Vec<PluginCallable>,
    pub descriptor: Arc<dyn Descriptor>,
}

impl Command {
    /// Parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Whether `option` is filled by a hidden prompt.
    pub fn is_secret(&self, option: &str) -> bool {
        self.prompts.iter().any(|p| p.hidden && p.option == option)
    }

    /// Positional arguments in order.
    pub fn arguments(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.kind == ParamKind::Argument)
    }

    /// Options in order.
    pub fn options(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.kind == ParamKind::Option)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params", &self.params)
            .field("prompts", &self.prompts)
            .field("worker_policy", &self.worker_policy)
            .field("run_once", &self.run_once)
            .field("plugins", &self.plugins)
            .field("descriptor", &self.descriptor.id())
            .finish()
    }
}

/// Parameters, prompts and policy shared by every `cli` entry of one
/// descriptor.
struct Shape {
    params: Vec<ParamSpec>,
    prompts: Vec<PromptSpec>,
    worker_policy: WorkerPolicy,
    run_once: bool,
    plugins: Vec<PluginCallable>,
}

/// Compiles descriptors into commands.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    validators: ValidatorTable,
}

impl Default for CommandCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandCompiler {
    /// Compiler with the built-in validators.
    pub fn new() -> Self {
        Self {
            validators: ValidatorTable::builtin(),
        }
    }

    /// Compiler with a custom validator table.
    pub fn with_validators(validators: ValidatorTable) -> Self {
        Self { validators }
    }

    /// Load plugins from `descriptors` and compile every command among them.
    pub fn compile(&self, descriptors: &[Arc<dyn Descriptor>]) -> Result<Vec<Command>, CompileError> {
        let plugins = PluginRegistry::load(descriptors)?;
        self.compile_with(descriptors, &plugins)
    }

    /// Compile every command in `descriptors` against an existing registry.
    pub fn compile_with(
        &self,
        descriptors: &[Arc<dyn Descriptor>],
        plugins: &PluginRegistry,
    ) -> Result<Vec<Command>, CompileError> {
        let mut commands = Vec::new();

        for descriptor in descriptors {
            let entries = descriptor.entries(tag::CLI);
            if entries.is_empty() {
                continue;
            }

            let shape = self.shape(descriptor.as_ref(), plugins)?;

            for (index, entry) in entries.into_iter().enumerate() {
                let Some(name) = entry.positional_text(0) else {
                    tracing::warn!(
                        descriptor = descriptor.id(),
                        index,
                        "skipping cli entry without a name"
                    );
                    continue;
                };
                let description = entry
                    .positional_text(1)
                    .unwrap_or_else(|| name.clone());

                tracing::debug!(
                    command = %name,
                    descriptor = descriptor.id(),
                    params = shape.params.len(),
                    prompts = shape.prompts.len(),
                    spawnable = shape.worker_policy.enabled,
                    "compiled command"
                );

                commands.push(Command {
                    name,
                    description,
                    params: shape.params.clone(),
                    prompts: shape.prompts.clone(),
                    worker_policy: shape.worker_policy,
                    run_once: shape.run_once,
                    plugins: shape.plugins.clone(),
                    descriptor: descriptor.clone(),
                });
            }
        }

        Ok(commands)
    }

    fn shape(&self, descriptor: &dyn Descriptor, plugins: &PluginRegistry) -> Result<Shape, CompileError> {
        let mut params = args::build(descriptor, ParamKind::Argument)?;
        params.extend(args::build(descriptor, ParamKind::Option)?);

        let worker_policy = workers::resolve(descriptor);
        if worker_policy.enabled {
            params.push(workers::workers_option());
        }
        ensure_unique(descriptor, &params)?;

        let prompts = prompts::build(descriptor, &self.validators, &mut params)?;

        Ok(Shape {
            params,
            prompts,
            worker_policy,
            run_once: descriptor.has_any(tag::ONCE),
            plugins: plugins.matching(descriptor),
        })
    }
}

fn ensure_unique(descriptor: &dyn Descriptor, params: &[ParamSpec]) -> Result<(), CompileError> {
    let mut seen = BTreeSet::new();
    for param in params {
        if !seen.insert(param.name.as_str()) {
            return Err(CompileError::DuplicateParam {
                descriptor: descriptor.id().to_string(),
                name: param.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::Definition;
    use crate::core::entry::AnnotationEntry;
    use crate::core::flags::ParamFlags;
    use serde_json::json;

    fn compile(defs: Vec<Definition>) -> Result<Vec<Command>, CompileError> {
        let shared: Vec<_> = defs.into_iter().map(Definition::shared).collect();
        CommandCompiler::new().compile(&shared)
    }

    fn names(params: &[ParamSpec]) -> Vec<&str> {
        params.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn parameter_order_is_arguments_options_workers_prompts() {
        let def = Definition::command("job", |_, _| Ok(()))
            .tag(tag::PROMPT, AnnotationEntry::with_args(["token"]))
            .tag(tag::OPTION, AnnotationEntry::with_args(["verbose"]))
            .mark("spawnable")
            .tag(tag::ARGUMENT, AnnotationEntry::with_args(["target", "REQUIRED"]))
            .tag(tag::CLI, AnnotationEntry::with_args(["job:run"]));

        let commands = compile(vec![def]).unwrap();
        assert_eq!(
            names(&commands[0].params),
            vec!["target", "verbose", "workers", "token"]
        );
        assert!(commands[0].worker_policy.enabled);
    }

    #[test]
    fn descriptors_without_cli_are_ignored() {
        let helper = Definition::command("helper", |_, _| Ok(()))
            .tag(tag::OPTION, AnnotationEntry::with_args(["x", "BOGUS|FLAGS"]));
        assert!(compile(vec![helper]).unwrap().is_empty());
    }

    #[test]
    fn description_defaults_to_name() {
        let def = Definition::command("x", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["crontab:task1"]))
            .tag(tag::CLI, AnnotationEntry::with_args(["something:group", "Let find out"]));

        let commands = compile(vec![def]).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].description, "crontab:task1");
        assert_eq!(commands[1].description, "Let find out");
    }

    #[test]
    fn multiple_cli_entries_share_handler_and_params() {
        let def = Definition::command("shared", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["a"]))
            .tag(tag::CLI, AnnotationEntry::with_args(["b"]))
            .tag(tag::ARGUMENT, AnnotationEntry::with_args(["name"]));

        let commands = compile(vec![def]).unwrap();
        assert_eq!(commands[0].params, commands[1].params);
        assert!(Arc::ptr_eq(&commands[0].descriptor, &commands[1].descriptor));
    }

    #[test]
    fn unnamed_cli_entries_are_skipped() {
        let def = Definition::command("x", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::new())
            .tag(tag::CLI, AnnotationEntry::with_args(["named"]));
        let commands = compile(vec![def]).unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].name, "named");
    }

    #[test]
    fn configuration_errors_fail_compilation() {
        let def = Definition::command("broken", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["broken"]))
            .tag(tag::OPTION, AnnotationEntry::with_args(["x", "VALUE_SOMETIMES", "hint"]));
        let err = compile(vec![def]).unwrap_err();
        assert_eq!(err.flag_token(), Some("VALUE_SOMETIMES"));
    }

    #[test]
    fn duplicate_parameter_names_fail() {
        let def = Definition::command("dup", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["dup"]))
            .tag(tag::ARGUMENT, AnnotationEntry::with_args(["name"]))
            .tag(tag::OPTION, AnnotationEntry::with_args(["name"]));
        assert!(matches!(
            compile(vec![def]),
            Err(CompileError::DuplicateParam { .. })
        ));

        let workers = Definition::command("w", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["w"]))
            .mark("spawn")
            .tag(tag::OPTION, AnnotationEntry::with_args(["workers", "VALUE_REQUIRED"]));
        assert!(matches!(
            compile(vec![workers]),
            Err(CompileError::DuplicateParam { ref name, .. }) if name == "workers"
        ));
    }

    #[test]
    fn plugins_and_once_are_resolved() {
        let plugin = Definition::plugin("audit", |_, _, _| Ok(()))
            .tag(tag::CLI_PLUGIN, AnnotationEntry::with_args(["audited"]));
        let cmd = Definition::command("cmd", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["cmd"]))
            .mark("audited")
            .mark("once");
        let other = Definition::command("other", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["other"]));

        let commands = compile(vec![plugin, cmd, other]).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].plugins.len(), 1);
        assert_eq!(commands[0].plugins[0].id(), "audit");
        assert!(commands[0].run_once);
        assert!(commands[1].plugins.is_empty());
        assert!(!commands[1].run_once);
    }

    #[test]
    fn greeting_scenario_parameters() {
        let def = Definition::command("greet", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["greet"]))
            .tag(tag::ARGUMENT, AnnotationEntry::with_args(["name", "REQUIRED"]))
            .tag(
                tag::OPTION,
                AnnotationEntry::with_args(["greeting", "VALUE_IS_ARRAY"])
                    .named("default", json!(["hi"])),
            );

        let command = compile(vec![def]).unwrap().remove(0);
        assert_eq!(
            command.params,
            vec![
                ParamSpec::argument("name", ParamFlags::REQUIRED, "name"),
                ParamSpec::option(
                    "greeting",
                    ParamFlags::OPTIONAL | ParamFlags::IS_ARRAY,
                    "greeting",
                    Some(json!(["hi"]))
                ),
            ]
        );
    }

    #[test]
    fn recompiling_is_idempotent() {
        let shared = vec![Definition::command("x", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["x"]))
            .tag(tag::OPTION, AnnotationEntry::with_args(["y", "VALUE_REQUIRED"]))
            .shared()];
        let compiler = CommandCompiler::new();
        let first = compiler.compile(&shared).unwrap();
        let second = compiler.compile(&shared).unwrap();
        assert_eq!(first[0].params, second[0].params);
        assert_eq!(first[0].name, second[0].name);
    }
}
