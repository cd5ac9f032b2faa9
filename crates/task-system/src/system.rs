use std::{
	fmt, mem,
	sync::{Mutex, PoisonError},
};

use async_channel as chan;
use futures_concurrency::future::Race;
use tokio::{spawn, sync::watch, task::JoinHandle};
use tracing::{error, trace, warn, Instrument};

use super::{
	error::{DispatcherShutdownError, RunError},
	task::{
		IntoTask, Task, TaskHandle, TaskId, TaskRemoteController, TaskState, TaskWorkState, Unrun,
	},
	worker,
};

/// A pool of workers pulling tasks from a single ready queue.
///
/// Tasks without predecessors go straight to the ready queue, while tasks dispatched with
/// [`Dispatcher::dispatch_after`] wait in a gate until every predecessor succeeds.
pub struct System<E: RunError> {
	workers: Mutex<Vec<JoinHandle<()>>>,
	shutdown_tx: watch::Sender<bool>,
	dispatcher: Dispatcher<E>,
}

impl<E: RunError> fmt::Debug for System<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("System")
			.field("is_shutdown", &*self.shutdown_tx.borrow())
			.finish_non_exhaustive()
	}
}

impl<E: RunError> System<E> {
	/// Creates a system with one worker per available CPU core.
	///
	/// Must be called from within a tokio runtime, as workers are spawned right away.
	#[must_use]
	pub fn new() -> Self {
		let workers_count = std::thread::available_parallelism().map_or_else(
			|e| {
				error!(?e, "Failed to get available parallelism in the task system");
				1
			},
			std::num::NonZeroUsize::get,
		);

		Self::with_workers(workers_count)
	}

	/// Creates a system with exactly `workers_count` workers (at least one).
	#[must_use]
	pub fn with_workers(workers_count: usize) -> Self {
		let workers_count = workers_count.max(1);

		let (ready_tx, ready_rx) = chan::unbounded();
		let (shutdown_tx, shutdown_rx) = watch::channel(false);

		let workers = (0..workers_count)
			.map(|worker_id| {
				spawn(
					worker::run(worker_id, ready_rx.clone(), shutdown_rx.clone()).in_current_span(),
				)
			})
			.collect();

		trace!(%workers_count, "Task system started");

		Self {
			workers: Mutex::new(workers),
			shutdown_tx,
			dispatcher: Dispatcher {
				ready_tx,
				shutdown_rx,
			},
		}
	}

	pub async fn dispatch(
		&self,
		into_task: impl IntoTask<E>,
	) -> Result<TaskHandle<E>, DispatcherShutdownError<E>> {
		self.dispatcher.dispatch(into_task).await
	}

	pub async fn dispatch_after(
		&self,
		into_task: impl IntoTask<E>,
		predecessors: impl IntoIterator<Item = TaskRemoteController> + Send,
	) -> Result<TaskHandle<E>, DispatcherShutdownError<E>> {
		self.dispatcher
			.dispatch_after(into_task, predecessors)
			.await
	}

	pub async fn dispatch_many(
		&self,
		into_tasks: impl IntoIterator<Item = impl IntoTask<E>> + Send,
	) -> Result<Vec<TaskHandle<E>>, DispatcherShutdownError<E>> {
		self.dispatcher.dispatch_many(into_tasks).await
	}

	#[must_use]
	pub fn get_dispatcher(&self) -> Dispatcher<E> {
		self.dispatcher.clone()
	}

	/// Interrupts running tasks, gives every queued or waiting task back through its handle as
	/// [`crate::TaskStatus::Shutdown`] and waits for all workers to stop.
	pub async fn shutdown(&self) {
		let workers = {
			let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
			mem::take(&mut *workers)
		};

		if workers.is_empty() {
			warn!("Trying to shutdown the tasks system that was already shutdown");
			return;
		}

		self.shutdown_tx.send_replace(true);
		self.dispatcher.ready_tx.close();

		for (worker_id, handle) in workers.into_iter().enumerate() {
			if let Err(e) = handle.await {
				error!(%worker_id, ?e, "Task system worker failed to shutdown");
			}
		}

		trace!("Task system shutdown");
	}
}

impl<E: RunError> Default for System<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E: RunError> Drop for System<E> {
	fn drop(&mut self) {
		// Workers drain whatever is left and stop on their own
		self.shutdown_tx.send_replace(true);
		self.dispatcher.ready_tx.close();
	}
}

/// A cheap cloneable handle to dispatch tasks into a [`System`].
pub struct Dispatcher<E: RunError> {
	ready_tx: chan::Sender<TaskWorkState<E>>,
	shutdown_rx: watch::Receiver<bool>,
}

impl<E: RunError> Clone for Dispatcher<E> {
	fn clone(&self) -> Self {
		Self {
			ready_tx: self.ready_tx.clone(),
			shutdown_rx: self.shutdown_rx.clone(),
		}
	}
}

impl<E: RunError> fmt::Debug for Dispatcher<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Dispatcher")
			.field("queued", &self.ready_tx.len())
			.field("is_shutdown", &self.is_shutdown())
			.finish()
	}
}

impl<E: RunError> Dispatcher<E> {
	#[must_use]
	pub fn is_shutdown(&self) -> bool {
		*self.shutdown_rx.borrow() || self.ready_tx.is_closed()
	}

	pub async fn dispatch(
		&self,
		into_task: impl IntoTask<E>,
	) -> Result<TaskHandle<E>, DispatcherShutdownError<E>> {
		self.enqueue(into_task.into_task()).await
	}

	pub async fn dispatch_many(
		&self,
		into_tasks: impl IntoIterator<Item = impl IntoTask<E>> + Send,
	) -> Result<Vec<TaskHandle<E>>, DispatcherShutdownError<E>> {
		let mut tasks = into_tasks
			.into_iter()
			.map(IntoTask::into_task)
			.collect::<Vec<_>>()
			.into_iter();

		let mut handles = Vec::with_capacity(tasks.len());

		while let Some(task) = tasks.next() {
			match self.enqueue(task).await {
				Ok(handle) => handles.push(handle),
				Err(DispatcherShutdownError(mut rejected)) => {
					rejected.extend(tasks);
					return Err(DispatcherShutdownError(rejected));
				}
			}
		}

		Ok(handles)
	}

	/// Dispatches a task that will only be run after every one of `predecessors` reaches
	/// [`TaskState::Succeeded`].
	///
	/// If any predecessor ends up in another terminal state, the task is never run and its handle
	/// resolves to [`crate::TaskStatus::Skipped`] naming the first predecessor that didn't succeed.
	pub async fn dispatch_after(
		&self,
		into_task: impl IntoTask<E>,
		predecessors: impl IntoIterator<Item = TaskRemoteController> + Send,
	) -> Result<TaskHandle<E>, DispatcherShutdownError<E>> {
		let task = into_task.into_task();
		let predecessors = predecessors.into_iter().collect::<Vec<_>>();

		if predecessors.is_empty() {
			return self.enqueue(task).await;
		}

		if self.is_shutdown() {
			return Err(DispatcherShutdownError(vec![task]));
		}

		let (work, handle) = TaskWorkState::new(task, self.shutdown_rx.clone());
		work.state_tx.send_replace(TaskState::Waiting);

		trace!(
			task_id = %work.id(),
			predecessors_count = predecessors.len(),
			"Task waiting on predecessors"
		);

		spawn(gate(work, predecessors, self.ready_tx.clone()).in_current_span());

		Ok(handle)
	}

	async fn enqueue(
		&self,
		task: Box<dyn Task<E>>,
	) -> Result<TaskHandle<E>, DispatcherShutdownError<E>> {
		if self.is_shutdown() {
			return Err(DispatcherShutdownError(vec![task]));
		}

		let (work, handle) = TaskWorkState::new(task, self.shutdown_rx.clone());

		trace!(task_id = %work.id(), "Dispatching task");

		self.ready_tx
			.send(work)
			.await
			.map_err(|chan::SendError(work)| DispatcherShutdownError(vec![work.task]))?;

		Ok(handle)
	}
}

enum GateOutcome {
	Ready,
	Blocked {
		dependency: TaskId,
		dependency_state: TaskState,
	},
	Interrupted,
}

async fn gate<E: RunError>(
	work: TaskWorkState<E>,
	predecessors: Vec<TaskRemoteController>,
	ready_tx: chan::Sender<TaskWorkState<E>>,
) {
	let outcome = {
		let all_succeeded = async {
			for predecessor in &predecessors {
				let state = predecessor.wait().await;
				if state != TaskState::Succeeded {
					return GateOutcome::Blocked {
						dependency: predecessor.task_id(),
						dependency_state: state,
					};
				}
			}

			GateOutcome::Ready
		};

		let interrupted = async {
			(&work.interrupter).await;
			GateOutcome::Interrupted
		};

		(all_succeeded, interrupted).race().await
	};

	match outcome {
		GateOutcome::Ready => {
			work.state_tx.send_replace(TaskState::Queued);

			if let Err(chan::SendError(work)) = ready_tx.send(work).await {
				work.finish_without_running(Unrun::Interrupted);
			}
		}

		GateOutcome::Blocked { .. } if work.interrupter.is_shutting_down() => {
			work.finish_without_running(Unrun::Interrupted);
		}

		GateOutcome::Blocked {
			dependency,
			dependency_state,
		} => {
			trace!(
				task_id = %work.id(),
				%dependency,
				?dependency_state,
				"Predecessor didn't succeed, task will not run"
			);

			work.finish_without_running(Unrun::Blocked {
				dependency,
				dependency_state,
			});
		}

		GateOutcome::Interrupted => work.finish_without_running(Unrun::Interrupted),
	}
}
