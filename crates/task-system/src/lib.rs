//!
//! # Task System
//!
//! Cairn's Task System runs tasks concurrently on a pool of workers and lets a task declare
//! predecessors that must succeed before it is allowed to start.
//!
//! Just bring your own unified error type and dispatch some tasks, the system will handle enqueueing,
//! parallel execution, and error handling for you. Aside from some niceties like:
//! - Workers pulling from a shared ready queue, one per available CPU core by default;
//! - Tasks gated on predecessors, which are skipped when any predecessor doesn't succeed;
//! - Cooperative cancellation through the [`Interrupter`];
//! - Optional per task timeouts, with forced abortion once they expire;
//! - When the system is shutdown, it will give every pending task back to its dispatcher;
//!
//!
//! ## Basic example
//!
//! ```
//! use cairn_task_system::{ExecStatus, Interrupter, Task, TaskId, TaskOutput, TaskStatus, TaskSystem};
//! use async_trait::async_trait;
//! use thiserror::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum SampleError {
//!     #[error("Sample error")]
//!     SampleError,
//! }
//!
//! #[derive(Debug)]
//! pub struct ReadyTask {
//!     id: TaskId,
//! }
//!
//! #[async_trait]
//! impl Task<SampleError> for ReadyTask {
//!     fn id(&self) -> TaskId {
//!         self.id
//!     }
//!
//!     async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
//!         Ok(ExecStatus::Done(TaskOutput::Empty))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let system = TaskSystem::<SampleError>::new();
//!
//!     let first = system.dispatch(ReadyTask { id: TaskId::new_v4() }).await.unwrap();
//!     let second = system
//!         .dispatch_after(ReadyTask { id: TaskId::new_v4() }, [first.remote_controller()])
//!         .await
//!         .unwrap();
//!
//!     assert!(matches!(first.await, Ok(TaskStatus::Done((_, TaskOutput::Empty)))));
//!     assert!(matches!(second.await, Ok(TaskStatus::Done((_, TaskOutput::Empty)))));
//!
//!     system.shutdown().await;
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod error;
mod system;
mod task;
mod worker;

pub use error::{DispatcherShutdownError, RunError, SystemError as TaskSystemError};
pub use system::{Dispatcher as TaskDispatcher, System as TaskSystem};
pub use task::{
	AnyTaskOutput, ExecStatus, Interrupter, IntoAnyTaskOutput, IntoTask, Task, TaskHandle, TaskId,
	TaskOutput, TaskRemoteController, TaskState, TaskStatus,
};
