//! engine::spawn
//!
//! Process spawning for the worker pool.
//!
//! # Architecture
//!
//! A worker is a re-execution of the current binary with the command's
//! resolved values on its command line and [`WORKER_ENV`] set to the worker
//! number. Values of hidden prompts never go on the command line; they are
//! passed in `CMDTAG_SECRET_<OPTION>` variables and restored by
//! [`restore_secrets`]. Inside a worker, the execution wrapper sees [`current_worker_id`]
//! and calls the handler directly; the worker process then exits with the
//! handler's status. Workers share no memory with the pool.
//!
//! [`Spawn`] is the seam the pool talks to. [`ProcessSpawner`] is the real
//! implementation; tests substitute their own.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command as Process, Stdio};

use serde_json::Value;

use crate::compile::Command;
use crate::core::flags::{ParamFlags, ParamKind};
use crate::core::io::Input;

/// Environment variable carrying the worker number into a worker process.
pub const WORKER_ENV: &str = "CMDTAG_WORKER_ID";

/// Prefix of the variables carrying hidden prompt values into a worker.
pub const SECRET_ENV_PREFIX: &str = "CMDTAG_SECRET_";

/// Worker number of the current process, if it is a spawned worker.
pub fn current_worker_id() -> Option<usize> {
    std::env::var(WORKER_ENV).ok()?.trim().parse().ok()
}

/// How a worker exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
}

impl WorkerExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A running worker.
pub trait Worker: Send {
    /// OS identifier (pid for processes).
    fn id(&self) -> u32;

    /// Check for exit without blocking.
    fn try_wait(&mut self) -> io::Result<Option<WorkerExit>>;
}

/// Starts workers.
pub trait Spawn: Send + Sync {
    /// Start worker number `worker` running `command` with `input`.
    fn spawn(&self, command: &Command, input: &Input, worker: usize) -> io::Result<Box<dyn Worker>>;
}

/// Spawns workers by re-executing a program.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    prefix: Vec<OsString>,
}

impl ProcessSpawner {
    /// Re-execute `program`, passing `prefix` before the command name.
    pub fn new(program: impl Into<PathBuf>, prefix: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            prefix,
        }
    }

    /// Re-execute the current binary with the global flags of `argv` (the
    /// leading `-`/`--` arguments between the program and command names).
    pub fn from_args(argv: &[OsString]) -> io::Result<Self> {
        let program = std::env::current_exe()?;
        let prefix = argv
            .iter()
            .skip(1)
            .take_while(|arg| arg.to_string_lossy().starts_with('-'))
            .cloned()
            .collect();
        Ok(Self::new(program, prefix))
    }

    /// [`ProcessSpawner::from_args`] over the process arguments.
    pub fn from_env() -> io::Result<Self> {
        let argv: Vec<OsString> = std::env::args_os().collect();
        Self::from_args(&argv)
    }

    /// Full argument list for one worker.
    pub fn args(&self, command: &Command, input: &Input) -> Vec<OsString> {
        let mut args = self.prefix.clone();
        args.push(command.name.clone().into());
        args.extend(worker_args(command, input).into_iter().map(OsString::from));
        args
    }
}

impl Spawn for ProcessSpawner {
    fn spawn(&self, command: &Command, input: &Input, worker: usize) -> io::Result<Box<dyn Worker>> {
        let child = Process::new(&self.program)
            .args(self.args(command, input))
            .env(WORKER_ENV, worker.to_string())
            .envs(worker_env(command, input))
            .stdin(Stdio::null())
            .spawn()?;
        Ok(Box::new(ChildWorker(child)))
    }
}

struct ChildWorker(Child);

impl Worker for ChildWorker {
    fn id(&self) -> u32 {
        self.0.id()
    }

    fn try_wait(&mut self) -> io::Result<Option<WorkerExit>> {
        Ok(self
            .0
            .try_wait()?
            .map(|status| WorkerExit { code: status.code() }))
    }
}

/// Render `input` back into command-line form for `command`.
///
/// Options come first as `--name=value` (repeated for arrays, bare `--name`
/// for switches), then `--`, then positional values in declaration order.
pub fn worker_args(command: &Command, input: &Input) -> Vec<String> {
    let mut args = Vec::new();

    for param in command.options() {
        if command.is_secret(&param.name) {
            continue;
        }
        let Some(value) = input.option(&param.name) else {
            continue;
        };
        if param.flags.contains(ParamFlags::NO_VALUE) || !param.takes_value() {
            if crate::core::entry::is_truthy(value) {
                args.push(format!("--{}", param.name));
            }
            continue;
        }
        for text in values(value) {
            args.push(format!("--{}={}", param.name, text));
        }
    }

    let positional: Vec<String> = command
        .params
        .iter()
        .filter(|p| p.kind == ParamKind::Argument)
        .flat_map(|p| input.argument(&p.name).map(values).unwrap_or_default())
        .collect();
    if !positional.is_empty() {
        args.push("--".to_string());
        args.extend(positional);
    }

    args
}

/// Variable name carrying the hidden value of `option`.
pub fn secret_env(option: &str) -> String {
    let suffix: String = option
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{SECRET_ENV_PREFIX}{suffix}")
}

/// Environment for a worker: one JSON-encoded variable per hidden prompt
/// value present in `input`.
pub fn worker_env(command: &Command, input: &Input) -> Vec<(String, String)> {
    command
        .prompts
        .iter()
        .filter(|p| p.hidden)
        .filter_map(|p| {
            let value = input.option(&p.option).filter(|v| !v.is_null())?;
            Some((secret_env(&p.option), value.to_string()))
        })
        .collect()
}

/// Put hidden prompt values back into a worker's `input`, reading each
/// variable through `lookup`.
pub fn restore_secrets<F>(command: &Command, input: &mut Input, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for prompt in command.prompts.iter().filter(|p| p.hidden) {
        let Some(text) = lookup(&secret_env(&prompt.option)) else {
            continue;
        };
        let value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        input.set_option(&prompt.option, value);
    }
}

fn values(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(crate::core::entry::value_text)
            .collect(),
        Value::String(s) => vec![s.clone()],
        other => crate::core::entry::value_text(other).into_iter().collect(),
    }
}
