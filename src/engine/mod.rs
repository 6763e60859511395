//! engine
//!
//! Runs compiled commands.
//!
//! # Architecture
//!
//! ```text
//! ExecutionWrapper::invoke
//!   -> plugins -> prompts -> [run lock]
//!   -> handler                      (plain commands, and inside workers)
//!   -> WorkerPool -> Spawn -> Worker (spawnable commands)
//! ```
//!
//! The pool is process-based: each worker is a fresh process that shares no
//! memory with the pool-managing process. The pool-managing process is
//! single-threaded and polls its workers without blocking.
//!
//! # Modules
//!
//! - [`exec`] - the per-invocation sequence
//! - [`pool`] - fan-out and respawn
//! - [`spawn`] - starting worker processes

pub mod exec;
pub mod pool;
pub mod spawn;

pub use exec::{ExecError, ExecutionWrapper, InterruptHandle, Outcome};
pub use pool::{PoolError, PoolReport, PoolState, WorkerPool};
pub use spawn::{
    current_worker_id, restore_secrets, worker_env, ProcessSpawner, Spawn, Worker, WorkerExit,
    SECRET_ENV_PREFIX, WORKER_ENV,
};
