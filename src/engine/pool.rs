//! engine::pool
//!
//! Process fan-out for spawnable commands.
//!
//! # State machine
//!
//! ```text
//! Spawning -> Running(n) -> Draining -> Done
//! ```
//!
//! - **Spawning**: start `--workers` processes (coerced to an integer, at
//!   least 1).
//! - **Running(n)**: `n` workers active and exits are being replaced
//!   (respawn enabled and no stop requested).
//! - **Draining**: exits are no longer replaced; waiting for the active set
//!   to empty.
//! - **Done**: no active workers remain. The pool never runs the handler
//!   itself.
//!
//! # Polling
//!
//! The pool polls every active worker with a non-blocking `try_wait`. When a
//! pass observes no exit it sleeps for the poll interval and tries again.
//! This poll is the only suspension point; it never blocks on a single child.
//!
//! # Failure
//!
//! A spawn failure is fatal and returned immediately. Workers that are
//! already running are left running. A worker that exits non-zero counts as
//! failed; with respawn enabled it is replaced like any other exit.
//!
//! # Stopping
//!
//! The only way to stop a respawning pool is the stop flag: once set, exits
//! are no longer replaced and the pool drains. Running workers are never
//! interrupted by the pool.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use super::spawn::{Spawn, Worker};
use crate::compile::{Command, WORKERS_OPTION};
use crate::core::io::Input;

/// Errors from the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Starting a worker failed. Already-running workers keep running.
    #[error("failed to spawn worker #{worker} for '{command}': {source}")]
    Spawn {
        command: String,
        worker: usize,
        #[source]
        source: io::Error,
    },

    /// Polling a worker for exit failed.
    #[error("failed to poll worker {pid} of '{command}': {source}")]
    Wait {
        command: String,
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// Pool lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Spawning,
    Running(usize),
    Draining,
    Done,
}

/// What happened during one pool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Configured worker count.
    pub workers: usize,
    /// Workers started, including replacements.
    pub spawned: usize,
    /// Workers observed exiting.
    pub exited: usize,
    /// Exits with a non-zero or missing code.
    pub failed: usize,
}

impl PoolReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Coerce the `--workers` value to a count, floored at 1.
///
/// Non-numeric values count as 1.
pub fn worker_count(input: &Input) -> usize {
    let requested = match input.option(WORKERS_OPTION) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(1),
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or_else(|_| {
            tracing::warn!(value = %s, "non-numeric --workers value; using 1");
            1
        }),
        _ => 1,
    };
    usize::try_from(requested.max(1)).unwrap_or(1)
}

/// Fans a command out into worker processes.
pub struct WorkerPool<'a> {
    spawner: &'a dyn Spawn,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    state: PoolState,
    history: Vec<PoolState>,
}

impl<'a> WorkerPool<'a> {
    pub fn new(spawner: &'a dyn Spawn, poll_interval: Duration) -> Self {
        Self {
            spawner,
            poll_interval,
            stop: Arc::new(AtomicBool::new(false)),
            state: PoolState::Spawning,
            history: Vec::new(),
        }
    }

    /// Share a stop flag; setting it turns respawning off.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    /// Every state entered, in order.
    pub fn history(&self) -> &[PoolState] {
        &self.history
    }

    /// Run `command` in `--workers` processes until none remain.
    ///
    /// Worker count and respawn policy are read once, on entry.
    pub fn run(&mut self, command: &Command, input: &Input) -> Result<PoolReport, PoolError> {
        let count = worker_count(input);
        let respawn = command.worker_policy.respawn_on_exit;
        let mut report = PoolReport {
            workers: count,
            ..PoolReport::default()
        };

        self.enter(PoolState::Spawning);
        tracing::info!(command = %command.name, workers = count, respawn, "starting worker pool");

        // Not pre-sized: the count comes straight from the command line.
        let mut active: Vec<Box<dyn Worker>> = Vec::new();
        for _ in 0..count {
            active.push(self.spawn(command, input, &mut report)?);
        }

        self.enter(if respawn && !self.stopping() {
            PoolState::Running(active.len())
        } else {
            PoolState::Draining
        });

        while !active.is_empty() {
            let mut observed = false;
            let mut i = 0;

            while i < active.len() {
                let pid = active[i].id();
                let exit = active[i].try_wait().map_err(|source| PoolError::Wait {
                    command: command.name.clone(),
                    pid,
                    source,
                })?;

                let Some(exit) = exit else {
                    i += 1;
                    continue;
                };

                active.swap_remove(i);
                observed = true;
                report.exited += 1;
                if !exit.success() {
                    report.failed += 1;
                }
                tracing::debug!(command = %command.name, pid, code = ?exit.code, "worker exited");

                if respawn && !self.stopping() {
                    active.push(self.spawn(command, input, &mut report)?);
                    self.enter(PoolState::Running(active.len()));
                } else if self.state != PoolState::Draining {
                    self.enter(PoolState::Draining);
                }
            }

            if !observed && !active.is_empty() {
                if self.stopping() && self.state != PoolState::Draining {
                    self.enter(PoolState::Draining);
                }
                thread::sleep(self.poll_interval);
            }
        }

        self.enter(PoolState::Done);
        tracing::info!(
            command = %command.name,
            spawned = report.spawned,
            failed = report.failed,
            "worker pool done"
        );
        Ok(report)
    }

    fn spawn(
        &self,
        command: &Command,
        input: &Input,
        report: &mut PoolReport,
    ) -> Result<Box<dyn Worker>, PoolError> {
        let number = report.spawned + 1;
        let worker = self
            .spawner
            .spawn(command, input, number)
            .map_err(|source| {
                tracing::error!(command = %command.name, worker = number, "spawn failed; running workers are left as-is");
                PoolError::Spawn {
                    command: command.name.clone(),
                    worker: number,
                    source,
                }
            })?;
        report.spawned += 1;
        tracing::debug!(command = %command.name, worker = number, pid = worker.id(), "spawned worker");
        Ok(worker)
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn enter(&mut self, state: PoolState) {
        if self.history.last() != Some(&state) {
            tracing::trace!(?state, "pool state");
            self.history.push(state);
        }
        self.state = state;
    }
}
