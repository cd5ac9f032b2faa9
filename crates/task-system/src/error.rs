use std::{error::Error, fmt};

use thiserror::Error;

use super::task::{Task, TaskId};

/// The unified error type every task dispatched to a given system must return.
///
/// Blanket implemented for any `std::error::Error` that can cross threads.
pub trait RunError: Error + fmt::Debug + Send + Sync + 'static {}

impl<T: Error + fmt::Debug + Send + Sync + 'static> RunError for T {}

#[derive(Debug, Error)]
pub enum SystemError {
	#[error("task timed out <task_id='{0}'>")]
	TaskTimeout(TaskId),
	#[error("task panicked <task_id='{0}'>")]
	TaskPanic(TaskId),
	#[error("task was lost by the system before reporting a result <task_id='{0}'>")]
	TaskLost(TaskId),
}

/// Returned by dispatchers after the system was shutdown, giving the tasks back so they can be
/// dispatched again to another system or dropped.
#[derive(Debug, Error)]
#[error("task system is shutdown <task_count={}>", .0.len())]
pub struct DispatcherShutdownError<E: RunError>(pub Vec<Box<dyn Task<E>>>);
