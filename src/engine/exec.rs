//! engine::exec
//!
//! The runtime behavior attached to every compiled command.
//!
//! # Sequence
//!
//! One call to [`ExecutionWrapper::invoke`] per CLI invocation:
//!
//! 1. Run matching plugin hooks in registration order. The first failure
//!    aborts the invocation.
//! 2. Resolve prompts in declaration order. A missing value is asked for
//!    (interactive only) and stored back onto its option. A validator, when
//!    present, checks the value whether it was supplied or typed.
//! 3. Take the run lock for `once` commands.
//! 4. Dispatch: through the [`WorkerPool`] for spawnable commands, otherwise
//!    straight to the handler.
//!
//! Inside a spawned worker (`Input::worker_id` is set) steps 1-3 already
//! happened in the pool-managing process, so the handler runs directly.
//!
//! # Invariants
//!
//! - Plugins run strictly before prompts, prompts strictly before dispatch
//! - A failing step stops every later step
//! - The pool-managing process never runs the handler itself

use std::error::Error as StdError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::pool::{PoolError, PoolReport, WorkerPool};
use super::spawn::{restore_secrets, Spawn};
use crate::compile::Command;
use crate::core::config::DEFAULT_POLL_INTERVAL;
use crate::core::io::{Input, Output};
use crate::core::lock::{LockError, RunLock};
use crate::ui::prompts::{Ask, PromptError};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that abort one invocation.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A plugin hook failed; nothing after it ran.
    #[error("plugin '{plugin}' aborted '{command}': {source}")]
    Plugin {
        plugin: String,
        command: String,
        #[source]
        source: BoxError,
    },

    /// A prompt value was rejected by its validator.
    #[error("invalid value '{value}' for option '--{option}'")]
    Validation { value: String, option: String },

    /// A missing prompt value could not be obtained.
    #[error("cannot resolve option '--{option}': {source}")]
    Prompt {
        option: String,
        #[source]
        source: PromptError,
    },

    /// The handler itself failed.
    #[error("command '{command}' failed: {source}")]
    Handler {
        command: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// How an invocation finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The handler ran in this process and returned.
    Completed,
    /// The command fanned out; every worker has exited.
    Pool(PoolReport),
}

impl Outcome {
    /// Process exit code: 0, or 1 when any worker failed.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed => 0,
            Outcome::Pool(report) if report.all_succeeded() => 0,
            Outcome::Pool(_) => 1,
        }
    }
}

/// Runs compiled commands.
#[derive(Clone)]
pub struct ExecutionWrapper {
    asker: Arc<dyn Ask>,
    spawner: Arc<dyn Spawn>,
    poll_interval: Duration,
    lock_dir: PathBuf,
    interrupt: InterruptHandle,
}

/// Ctrl-C handling shared between the binary and running pools.
///
/// While a pool is running an interrupt turns respawning off so the pool
/// drains; otherwise the caller should terminate.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    stop: Arc<AtomicBool>,
    pooling: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Record an interrupt. Returns false when no pool is running.
    pub fn interrupt(&self) -> bool {
        if !self.pooling.load(Ordering::SeqCst) {
            return false;
        }
        if !self.stop.swap(true, Ordering::SeqCst) {
            tracing::warn!("interrupt received; no longer respawning workers");
        }
        true
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Marks a pool as running for the lifetime of the guard. An interrupt
/// only stops the pool it was delivered to.
struct Pooling<'a>(&'a InterruptHandle);

impl<'a> Pooling<'a> {
    fn start(handle: &'a InterruptHandle) -> Self {
        handle.pooling.store(true, Ordering::SeqCst);
        Self(handle)
    }
}

impl Drop for Pooling<'_> {
    fn drop(&mut self) {
        self.0.pooling.store(false, Ordering::SeqCst);
        self.0.stop.store(false, Ordering::SeqCst);
    }
}

impl ExecutionWrapper {
    pub fn new(asker: Arc<dyn Ask>, spawner: Arc<dyn Spawn>) -> Self {
        Self {
            asker,
            spawner,
            poll_interval: DEFAULT_POLL_INTERVAL,
            lock_dir: std::env::temp_dir().join("cmdtag"),
            interrupt: InterruptHandle::default(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Directory holding run locks for `once` commands.
    pub fn with_lock_dir(mut self, lock_dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = lock_dir.into();
        self
    }

    /// Handle for delivering Ctrl-C to running pools.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Run `command` once.
    pub fn invoke(
        &self,
        command: &Command,
        input: &mut Input,
        output: &mut Output,
    ) -> Result<Outcome, ExecError> {
        if let Some(worker) = input.worker_id() {
            tracing::debug!(command = %command.name, worker, "running as worker");
            restore_secrets(command, input, |key| std::env::var(key).ok());
            self.run_handler(command, input, output)?;
            return Ok(Outcome::Completed);
        }

        self.run_plugins(command, input, output)?;
        self.resolve_prompts(command, input)?;

        let _lock = if command.run_once {
            Some(RunLock::acquire(&self.lock_dir, &command.name)?)
        } else {
            None
        };

        if command.worker_policy.enabled {
            let _pooling = Pooling::start(&self.interrupt);
            let report = WorkerPool::new(self.spawner.as_ref(), self.poll_interval)
                .with_stop_flag(self.interrupt.stop.clone())
                .run(command, input)?;
            return Ok(Outcome::Pool(report));
        }

        self.run_handler(command, input, output)?;
        Ok(Outcome::Completed)
    }

    fn run_plugins(&self, command: &Command, input: &Input, output: &mut Output) -> Result<(), ExecError> {
        for plugin in &command.plugins {
            tracing::debug!(command = %command.name, plugin = plugin.id(), "running plugin");
            plugin
                .call(command.descriptor.as_ref(), input, output)
                .map_err(|e| ExecError::Plugin {
                    plugin: plugin.id().to_string(),
                    command: command.name.clone(),
                    source: e.into(),
                })?;
        }
        Ok(())
    }

    fn resolve_prompts(&self, command: &Command, input: &mut Input) -> Result<(), ExecError> {
        for prompt in &command.prompts {
            let mut values: Vec<String> = input
                .option_list(&prompt.option)
                .into_iter()
                .filter(|v| !v.is_empty())
                .collect();

            if values.is_empty() {
                if !input.is_interactive() {
                    return Err(ExecError::Prompt {
                        option: prompt.option.clone(),
                        source: PromptError::NotInteractive,
                    });
                }
                let answer = self
                    .asker
                    .ask(&prompt.question, prompt.hidden)
                    .map_err(|source| ExecError::Prompt {
                        option: prompt.option.clone(),
                        source,
                    })?;
                input.set_option(&prompt.option, answer.clone());
                values.push(answer);
            }

            if let Some(validator) = &prompt.validator {
                if let Some(bad) = values.iter().find(|v| !validator.check(v)) {
                    return Err(ExecError::Validation {
                        value: bad.clone(),
                        option: prompt.option.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn run_handler(&self, command: &Command, input: &Input, output: &mut Output) -> Result<(), ExecError> {
        command
            .descriptor
            .invoke(input, output)
            .map_err(|e| ExecError::Handler {
                command: command.name.clone(),
                source: e.into(),
            })
    }
}

impl std::fmt::Debug for ExecutionWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionWrapper")
            .field("poll_interval", &self.poll_interval)
            .field("lock_dir", &self.lock_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::CommandCompiler;
    use crate::core::descriptor::{tag, Definition, Descriptor};
    use crate::core::entry::AnnotationEntry;
    use crate::engine::spawn::{Worker, WorkerExit};
    use crate::ui::prompts::ScriptedAsker;
    use serde_json::json;
    use std::io;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct LoggingAsker {
        log: Log,
        answer: String,
    }

    impl Ask for LoggingAsker {
        fn ask(&self, question: &str, _hidden: bool) -> Result<String, PromptError> {
            self.log.lock().unwrap().push(format!("ask {question}"));
            Ok(self.answer.clone())
        }
    }

    struct DoneWorker;

    impl Worker for DoneWorker {
        fn id(&self) -> u32 {
            1
        }

        fn try_wait(&mut self) -> io::Result<Option<WorkerExit>> {
            Ok(Some(WorkerExit { code: Some(0) }))
        }
    }

    #[derive(Default)]
    struct CountingSpawner(AtomicUsize);

    impl Spawn for CountingSpawner {
        fn spawn(&self, _: &Command, _: &Input, _: usize) -> io::Result<Box<dyn Worker>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(DoneWorker))
        }
    }

    fn wrapper(asker: Arc<dyn Ask>) -> ExecutionWrapper {
        ExecutionWrapper::new(asker, Arc::new(CountingSpawner::default()))
            .with_poll_interval(Duration::from_millis(1))
    }

    fn logging_handler(log: &Log) -> Definition {
        let log = log.clone();
        Definition::command("deploy", move |input: &Input, _: &mut Output| {
            let token = input.option_text("token").unwrap_or_default();
            log.lock().unwrap().push(format!("handler {token}"));
            Ok(())
        })
    }

    fn logging_plugin(log: &Log, id: &str, fail: bool) -> Arc<dyn Descriptor> {
        let log = log.clone();
        let name = id.to_string();
        Definition::plugin(id, move |target: &dyn Descriptor, _: &Input, _: &mut Output| {
            log.lock().unwrap().push(format!("plugin {name} for {}", target.id()));
            if fail {
                anyhow::bail!("{name} refused");
            }
            Ok(())
        })
        .tag(tag::CLI_PLUGIN, AnnotationEntry::with_args(["audited"]))
        .shared()
    }

    fn compile(descriptors: Vec<Arc<dyn Descriptor>>) -> Vec<Command> {
        CommandCompiler::new().compile(&descriptors).unwrap()
    }

    fn deploy(log: &Log) -> Arc<dyn Descriptor> {
        logging_handler(log)
            .tag(tag::CLI, AnnotationEntry::with_args(["deploy"]))
            .tag(tag::PROMPT, AnnotationEntry::with_args(["token", "Token?"]))
            .mark("audited")
            .shared()
    }

    #[test]
    fn plugins_then_prompts_then_handler() {
        let log: Log = Arc::default();
        let commands = compile(vec![
            logging_plugin(&log, "first", false),
            deploy(&log),
            logging_plugin(&log, "second", false),
        ]);
        let asker = Arc::new(LoggingAsker {
            log: log.clone(),
            answer: "abc".into(),
        });
        let mut input = Input::new("deploy").interactive(true);
        let (mut output, _) = Output::capture();

        let outcome = wrapper(asker)
            .invoke(&commands[0], &mut input, &mut output)
            .unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "plugin first for deploy",
                "plugin second for deploy",
                "ask Token?",
                "handler abc",
            ]
        );
        assert_eq!(input.option_text("token").as_deref(), Some("abc"));
    }

    #[test]
    fn failing_plugin_stops_everything_after_it() {
        let log: Log = Arc::default();
        let commands = compile(vec![
            logging_plugin(&log, "first", true),
            logging_plugin(&log, "second", false),
            deploy(&log),
        ]);
        let asker = Arc::new(ScriptedAsker::new(["abc"]));
        let mut input = Input::new("deploy").interactive(true);
        let (mut output, _) = Output::capture();

        let err = wrapper(asker.clone())
            .invoke(&commands[0], &mut input, &mut output)
            .unwrap_err();

        assert!(matches!(err, ExecError::Plugin { ref plugin, .. } if plugin == "first"));
        assert!(err.to_string().contains("first refused"));
        assert_eq!(*log.lock().unwrap(), vec!["plugin first for deploy"]);
        assert!(asker.asked().is_empty());
    }

    #[test]
    fn supplied_prompt_values_are_not_asked() {
        let log: Log = Arc::default();
        let commands = compile(vec![deploy(&log)]);
        let asker = Arc::new(ScriptedAsker::default());
        let mut input = Input::new("deploy").with_option("token", "given");
        let (mut output, _) = Output::capture();

        wrapper(asker.clone())
            .invoke(&commands[0], &mut input, &mut output)
            .unwrap();

        assert!(asker.asked().is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["handler given"]);
    }

    #[test]
    fn missing_prompts_are_asked_once_each_in_order() {
        let def = Definition::command("login", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["login"]))
            .tag(tag::PROMPT, AnnotationEntry::with_args(["user", "User?"]))
            .tag(tag::PROMPT, AnnotationEntry::with_args(["host", "Host?"]))
            .tag(
                tag::PROMPT,
                AnnotationEntry::with_args(["password", "Password?"]).named("secret", true),
            )
            .shared();
        let commands = compile(vec![def]);
        let asker = Arc::new(ScriptedAsker::new(["bob", "hunter2"]));
        let mut input = Input::new("login")
            .with_option("host", "example.org")
            .interactive(true);
        let (mut output, _) = Output::capture();

        wrapper(asker.clone())
            .invoke(&commands[0], &mut input, &mut output)
            .unwrap();

        assert_eq!(
            asker.asked(),
            vec![("User?".to_string(), false), ("Password?".to_string(), true)]
        );
        assert_eq!(input.option_text("user").as_deref(), Some("bob"));
        assert_eq!(input.option_text("password").as_deref(), Some("hunter2"));
    }

    fn validated() -> Vec<Command> {
        let def = Definition::command("age", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["age"]))
            .tag(
                tag::PROMPT,
                AnnotationEntry::with_args(["years", "How old?"]).named("validate", "integer"),
            )
            .shared();
        compile(vec![def])
    }

    #[test]
    fn validator_rejects_supplied_and_typed_values() {
        let commands = validated();
        let (mut output, _) = Output::capture();

        let mut supplied = Input::new("age").with_option("years", "old");
        let err = wrapper(Arc::new(ScriptedAsker::default()))
            .invoke(&commands[0], &mut supplied, &mut output)
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid value 'old' for option '--years'");

        let mut typed = Input::new("age").interactive(true);
        let err = wrapper(Arc::new(ScriptedAsker::new(["ancient"])))
            .invoke(&commands[0], &mut typed, &mut output)
            .unwrap_err();
        assert!(matches!(
            err,
            ExecError::Validation { ref value, ref option } if value == "ancient" && option == "years"
        ));

        let mut good = Input::new("age").with_option("years", "42");
        wrapper(Arc::new(ScriptedAsker::default()))
            .invoke(&commands[0], &mut good, &mut output)
            .unwrap();
    }

    #[test]
    fn missing_prompt_without_interaction_fails() {
        let commands = validated();
        let asker = Arc::new(ScriptedAsker::new(["7"]));
        let mut input = Input::new("age").interactive(false);
        let (mut output, _) = Output::capture();

        let err = wrapper(asker.clone())
            .invoke(&commands[0], &mut input, &mut output)
            .unwrap_err();

        assert!(matches!(
            err,
            ExecError::Prompt {
                source: PromptError::NotInteractive,
                ..
            }
        ));
        assert!(asker.asked().is_empty());
    }

    #[test]
    fn handler_errors_name_the_command() {
        let def = Definition::command("boom", |_, _| anyhow::bail!("kaput"))
            .tag(tag::CLI, AnnotationEntry::with_args(["boom"]))
            .shared();
        let commands = compile(vec![def]);
        let (mut output, _) = Output::capture();

        let err = wrapper(Arc::new(ScriptedAsker::default()))
            .invoke(&commands[0], &mut Input::new("boom"), &mut output)
            .unwrap_err();
        assert_eq!(err.to_string(), "command 'boom' failed: kaput");
    }

    #[test]
    fn spawnable_commands_go_through_the_pool() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let def = Definition::command("job", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .tag(tag::CLI, AnnotationEntry::with_args(["job"]))
        .mark("spawnable")
        .shared();
        let commands = compile(vec![def]);
        let spawner = Arc::new(CountingSpawner::default());
        let wrapper = ExecutionWrapper::new(Arc::new(ScriptedAsker::default()), spawner.clone())
            .with_poll_interval(Duration::from_millis(1));
        let (mut output, _) = Output::capture();

        let mut input = Input::new("job").with_option("workers", json!("3"));
        let outcome = wrapper
            .invoke(&commands[0], &mut input, &mut output)
            .unwrap();

        assert!(matches!(outcome, Outcome::Pool(ref r) if r.spawned == 3));
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(spawner.0.load(Ordering::SeqCst), 3);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        // Inside a worker the handler runs directly.
        let mut worker_input = input.clone();
        worker_input.set_worker_id(Some(2));
        let outcome = wrapper
            .invoke(&commands[0], &mut worker_input, &mut output)
            .unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(spawner.0.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn workers_skip_plugins_and_prompts() {
        let log: Log = Arc::default();
        let commands = compile(vec![logging_plugin(&log, "first", true), deploy(&log)]);
        let mut input = Input::new("deploy").with_option("token", "t");
        input.set_worker_id(Some(1));
        let (mut output, _) = Output::capture();

        wrapper(Arc::new(ScriptedAsker::default()))
            .invoke(&commands[0], &mut input, &mut output)
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["handler t"]);
    }

    #[test]
    fn once_commands_refuse_concurrent_runs() {
        let dir = tempfile::tempdir().unwrap();
        let def = Definition::command("cron", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["crontab:task1"]))
            .mark("once")
            .shared();
        let commands = compile(vec![def]);
        let wrapper = wrapper(Arc::new(ScriptedAsker::default())).with_lock_dir(dir.path());
        let (mut output, _) = Output::capture();

        let held = RunLock::acquire(dir.path(), "crontab:task1").unwrap();
        let err = wrapper
            .invoke(&commands[0], &mut Input::new("crontab:task1"), &mut output)
            .unwrap_err();
        assert!(matches!(err, ExecError::Lock(LockError::AlreadyRunning { .. })));

        drop(held);
        wrapper
            .invoke(&commands[0], &mut Input::new("crontab:task1"), &mut output)
            .unwrap();
    }

    #[test]
    fn interrupts_only_apply_while_pooling() {
        let handle = InterruptHandle::default();
        assert!(!handle.interrupt());
        assert!(!handle.is_stopping());

        let guard = Pooling::start(&handle);
        assert!(handle.interrupt());
        assert!(handle.is_stopping());
        drop(guard);
        assert!(!handle.interrupt());
        assert!(!handle.is_stopping());
    }

    #[test]
    fn a_later_pool_respawns_after_an_interrupted_one() {
        let def = Definition::command("job", |_, _| Ok(()))
            .tag(tag::CLI, AnnotationEntry::with_args(["job"]))
            .mark("spawnable")
            .mark("respawn")
            .shared();
        let commands = compile(vec![def]);
        let handle = InterruptHandle::default();

        {
            let _first = Pooling::start(&handle);
            assert!(handle.interrupt());
        }
        assert!(!handle.is_stopping());

        // Respawning again; the spawner interrupts this pool at its 5th worker.
        let spawner = StoppingSpawner {
            handle: handle.clone(),
            spawned: AtomicUsize::new(0),
            stop_at: 5,
        };
        let wrapper = ExecutionWrapper {
            interrupt: handle.clone(),
            ..wrapper(Arc::new(ScriptedAsker::default()))
        };
        let wrapper = ExecutionWrapper {
            spawner: Arc::new(spawner),
            ..wrapper
        };
        let (mut output, _) = Output::capture();
        let mut input = Input::new("job").with_option("workers", "2");
        let outcome = wrapper.invoke(&commands[0], &mut input, &mut output).unwrap();
        assert!(matches!(outcome, Outcome::Pool(ref r) if r.spawned == 5));
        assert!(!handle.is_stopping());
    }

    /// Spawner that interrupts the running pool once `stop_at` workers exist.
    struct StoppingSpawner {
        handle: InterruptHandle,
        spawned: AtomicUsize,
        stop_at: usize,
    }

    impl Spawn for StoppingSpawner {
        fn spawn(&self, _: &Command, _: &Input, _: usize) -> io::Result<Box<dyn Worker>> {
            if self.spawned.fetch_add(1, Ordering::SeqCst) + 1 >= self.stop_at {
                self.handle.interrupt();
            }
            Ok(Box::new(DoneWorker))
        }
    }

    #[test]
    fn pool_exit_code_reflects_failures() {
        let report = PoolReport {
            workers: 2,
            spawned: 2,
            exited: 2,
            failed: 1,
        };
        assert_eq!(Outcome::Pool(report).exit_code(), 1);
        assert_eq!(Outcome::Completed.exit_code(), 0);
    }
}
