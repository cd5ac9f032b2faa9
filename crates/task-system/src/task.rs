use std::{
	fmt,
	future::{Future, IntoFuture},
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
	time::Duration,
};

use async_trait::async_trait;
use downcast_rs::{impl_downcast, Downcast};
use futures_concurrency::future::Race;
use tokio::sync::{oneshot, watch};
use tracing::trace;
use uuid::Uuid;

use super::error::{RunError, SystemError};

/// A unique identifier for a task using the [`uuid`](https://docs.rs/uuid) crate.
pub type TaskId = Uuid;

/// A trait that represents any kind of output that a task can return.
///
/// The user will downcast it to the concrete type that the task returns. Most of the time,
/// tasks will not return anything, so it isn't a costly abstraction, as only a heap allocation
/// is needed when the user wants to return a [`Box<dyn AnyTaskOutput>`].
pub trait AnyTaskOutput: Send + Downcast + 'static {}

impl fmt::Debug for Box<dyn AnyTaskOutput> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<AnyTaskOutput>")
	}
}

impl_downcast!(AnyTaskOutput);

/// Blanket implementation for all types that implements `Send + 'static`
impl<T: Send + 'static> AnyTaskOutput for T {}

/// A helper trait to convert any type that implements [`AnyTaskOutput`] into a [`TaskOutput`], boxing it.
pub trait IntoAnyTaskOutput {
	fn into_output(self) -> TaskOutput;
}

impl<T: AnyTaskOutput + 'static> IntoAnyTaskOutput for T {
	fn into_output(self) -> TaskOutput {
		TaskOutput::Out(Box::new(self))
	}
}

/// An enum representing whether a task returned anything or not.
#[derive(Debug)]
pub enum TaskOutput {
	Out(Box<dyn AnyTaskOutput>),
	Empty,
}

impl From<()> for TaskOutput {
	fn from((): ()) -> Self {
		Self::Empty
	}
}

/// An enum representing all possible outcomes for a task.
#[derive(Debug)]
pub enum TaskStatus<E: RunError> {
	/// The task has finished successfully and maybe has some output for the user.
	Done((TaskId, TaskOutput)),
	/// Task was cancelled by the user, either while running or before it got a chance to run.
	Canceled,
	/// One of the task's predecessors didn't succeed, so the task was never run.
	Skipped {
		dependency: TaskId,
		dependency_state: TaskState,
	},
	/// The task system was shutdown and we give back the task to the user so they can downcast it
	/// back to the original concrete type and decide what to do with it.
	Shutdown(Box<dyn Task<E>>),
	/// Task had and error so we return it back and the user can handle it appropriately.
	Error(E),
}

/// Represents whether the current [`Task::run`] method on a task finished successfully or was interrupted.
#[derive(Debug)]
pub enum ExecStatus {
	Done(TaskOutput),
	Canceled,
}

/// Observable lifecycle of a dispatched task, shared with every [`TaskRemoteController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
	/// Sitting in the ready queue, waiting for a free worker.
	Queued,
	/// Held back until all its predecessors succeed.
	Waiting,
	Running,
	Succeeded,
	Failed,
	Canceled,
	Skipped,
	Shutdown,
}

impl TaskState {
	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(
			self,
			Self::Succeeded | Self::Failed | Self::Canceled | Self::Skipped | Self::Shutdown
		)
	}
}

/// A helper trait to convert any type that implements [`Task<E>`] into a [`Box<dyn Task<E>>`], boxing it.
pub trait IntoTask<E>: Send {
	fn into_task(self) -> Box<dyn Task<E>>;
}

/// Blanket implementation for all types that implements [`Task<E>`] and `'static`
impl<T: Task<E> + 'static, E: RunError> IntoTask<E> for T {
	fn into_task(self) -> Box<dyn Task<E>> {
		Box::new(self)
	}
}

/// The main trait that represents a task that can be dispatched to the task system.
///
/// All tasks in a system must return the same generic error type, so we can have a unified
/// error handling.
#[async_trait]
pub trait Task<E: RunError>: Downcast + Send + Sync + 'static {
	/// An unique identifier for the task, it will be used to identify the task on the system and also to the user.
	fn id(&self) -> TaskId;

	/// By default the task system will wait indefinitely for the task to finish. Returning a
	/// [`Duration`] here makes the system abort the task and report
	/// [`SystemError::TaskTimeout`] once it runs for longer than that.
	fn with_timeout(&self) -> Option<Duration> {
		None
	}

	/// The work itself, called once by a worker.
	///
	/// The [`interrupter`](Interrupter) tells the task when the user canceled it or the system is
	/// shutting down, so the task can stop at a point where it leaves no inconsistent state behind.
	async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, E>;
}

impl_downcast!(Task<E> where E: RunError);

impl<E: RunError> fmt::Debug for Box<dyn Task<E>> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<Task>")
	}
}

/// A helper object that can be used to check if the user requested a cancel or the system is
/// shutting down, so the task `run` implementation can decide the appropriate moment to stop.
///
/// Awaiting a `&Interrupter` resolves once an interruption is requested.
#[derive(Debug)]
pub struct Interrupter {
	cancel_rx: watch::Receiver<bool>,
	shutdown_rx: watch::Receiver<bool>,
}

impl Interrupter {
	pub(crate) const fn new(
		cancel_rx: watch::Receiver<bool>,
		shutdown_rx: watch::Receiver<bool>,
	) -> Self {
		Self {
			cancel_rx,
			shutdown_rx,
		}
	}

	/// Non-blocking check for a pending cancel or shutdown request.
	#[must_use]
	pub fn is_interrupted(&self) -> bool {
		*self.cancel_rx.borrow() || self.is_shutting_down()
	}

	pub(crate) fn is_shutting_down(&self) -> bool {
		*self.shutdown_rx.borrow()
	}
}

async fn wait_until_set(mut flag_rx: watch::Receiver<bool>) {
	let sender_dropped = flag_rx.wait_for(|flag| *flag).await.is_err();

	if sender_dropped {
		// Nobody can interrupt us anymore, so the task runs freely until it ends
		std::future::pending::<()>().await;
	}
}

impl<'recv> IntoFuture for &'recv Interrupter {
	type Output = ();

	type IntoFuture = Pin<Box<dyn Future<Output = ()> + Send + 'recv>>;

	fn into_future(self) -> Self::IntoFuture {
		let cancel_rx = self.cancel_rx.clone();
		let shutdown_rx = self.shutdown_rx.clone();

		Box::pin(async move {
			(wait_until_set(cancel_rx), wait_until_set(shutdown_rx))
				.race()
				.await;
		})
	}
}

#[macro_export]
macro_rules! check_interruption {
	($interrupter:ident) => {
		let interrupter: &$crate::Interrupter = $interrupter;

		if interrupter.is_interrupted() {
			::tracing::trace!("Task was interrupted by the user or by the task system");
			return Ok($crate::ExecStatus::Canceled);
		}
	};
}

/// A remote controller of a task that can be used to cancel it, inspect its state or wait for
/// its completion. It's also what [`crate::TaskDispatcher::dispatch_after`] takes as predecessors.
#[derive(Debug, Clone)]
pub struct TaskRemoteController {
	pub(crate) task_id: TaskId,
	pub(crate) state_rx: watch::Receiver<TaskState>,
	pub(crate) cancel_tx: Arc<watch::Sender<bool>>,
}

impl TaskRemoteController {
	/// Get the unique identifier of the task
	#[must_use]
	pub const fn task_id(&self) -> TaskId {
		self.task_id
	}

	#[must_use]
	pub fn state(&self) -> TaskState {
		*self.state_rx.borrow()
	}

	/// Request a cancel, the running task will stop at the next safe point defined by its
	/// [`Interrupter`] checks, and a task that didn't start yet will never run.
	pub fn cancel(&self) {
		if self.is_done() {
			trace!(task_id = %self.task_id, "Task is finalized, will not cancel");
			return;
		}

		self.cancel_tx.send_replace(true);
	}

	/// Verify if the task was already completed
	#[must_use]
	pub fn is_done(&self) -> bool {
		self.state().is_terminal()
	}

	/// Wait until the task reaches a terminal state and return it.
	pub async fn wait(&self) -> TaskState {
		let mut state_rx = self.state_rx.clone();

		let reached_terminal = state_rx
			.wait_for(|state| state.is_terminal())
			.await
			.is_ok();

		if !reached_terminal {
			trace!(task_id = %self.task_id, "Task state channel closed before a terminal state");
		}

		let state = *state_rx.borrow();
		state
	}
}

/// A handle returned when a task is dispatched to the task system, it can be used to cancel the
/// task or to wait until it gets completed.
#[derive(Debug)]
pub struct TaskHandle<E: RunError> {
	pub(crate) done_rx: oneshot::Receiver<Result<TaskStatus<E>, SystemError>>,
	pub(crate) controller: TaskRemoteController,
}

impl<E: RunError> Future for TaskHandle<E> {
	type Output = Result<TaskStatus<E>, SystemError>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let task_id = self.controller.task_id;

		Pin::new(&mut self.done_rx)
			.poll(cx)
			.map(|res| res.unwrap_or(Err(SystemError::TaskLost(task_id))))
	}
}

impl<E: RunError> TaskHandle<E> {
	/// Get the unique identifier of the task
	#[must_use]
	pub const fn task_id(&self) -> TaskId {
		self.controller.task_id
	}

	#[must_use]
	pub fn state(&self) -> TaskState {
		self.controller.state()
	}

	pub fn cancel(&self) {
		self.controller.cancel();
	}

	/// Gets the [`TaskRemoteController`] object that can be used to control the task remotely,
	/// or to declare this task as a predecessor of another one.
	#[must_use]
	pub fn remote_controller(&self) -> TaskRemoteController {
		self.controller.clone()
	}
}

pub(crate) struct TaskWorkState<E: RunError> {
	pub(crate) task: Box<dyn Task<E>>,
	pub(crate) done_tx: oneshot::Sender<Result<TaskStatus<E>, SystemError>>,
	pub(crate) state_tx: watch::Sender<TaskState>,
	pub(crate) interrupter: Interrupter,
}

impl<E: RunError> TaskWorkState<E> {
	pub(crate) fn new(
		task: Box<dyn Task<E>>,
		shutdown_rx: watch::Receiver<bool>,
	) -> (Self, TaskHandle<E>) {
		let task_id = task.id();

		let (done_tx, done_rx) = oneshot::channel();
		let (state_tx, state_rx) = watch::channel(TaskState::Queued);
		let (cancel_tx, cancel_rx) = watch::channel(false);

		(
			Self {
				task,
				done_tx,
				state_tx,
				interrupter: Interrupter::new(cancel_rx, shutdown_rx),
			},
			TaskHandle {
				done_rx,
				controller: TaskRemoteController {
					task_id,
					state_rx,
					cancel_tx: Arc::new(cancel_tx),
				},
			},
		)
	}

	#[inline]
	pub(crate) fn id(&self) -> TaskId {
		self.task.id()
	}

	/// Finalizes a task that will never run: interrupted while queued or waiting, or blocked
	/// by a failed predecessor.
	pub(crate) fn finish_without_running(self, reason: Unrun) {
		let Self {
			task,
			done_tx,
			state_tx,
			interrupter,
		} = self;

		let task_id = task.id();

		match reason {
			Unrun::Interrupted if interrupter.is_shutting_down() => report(
				task_id,
				done_tx,
				&state_tx,
				TaskState::Shutdown,
				Ok(TaskStatus::Shutdown(task)),
			),
			Unrun::Interrupted => report(
				task_id,
				done_tx,
				&state_tx,
				TaskState::Canceled,
				Ok(TaskStatus::Canceled),
			),
			Unrun::Blocked {
				dependency,
				dependency_state,
			} => report(
				task_id,
				done_tx,
				&state_tx,
				TaskState::Skipped,
				Ok(TaskStatus::Skipped {
					dependency,
					dependency_state,
				}),
			),
		}
	}
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Unrun {
	Interrupted,
	Blocked {
		dependency: TaskId,
		dependency_state: TaskState,
	},
}

/// Publishes the terminal state to every controller before handing the status to the handle, so
/// dependents never observe a finished handle with a stale state.
pub(crate) fn report<E: RunError>(
	task_id: TaskId,
	done_tx: oneshot::Sender<Result<TaskStatus<E>, SystemError>>,
	state_tx: &watch::Sender<TaskState>,
	state: TaskState,
	status: Result<TaskStatus<E>, SystemError>,
) {
	state_tx.send_replace(state);

	if done_tx.send(status).is_err() {
		trace!(%task_id, ?state, "Task handle dropped before receiving the task result");
	}
}
