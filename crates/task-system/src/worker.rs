use async_channel as chan;
use tokio::{spawn, sync::watch, time::timeout};
use tracing::{debug, error, trace, warn, Instrument};

use super::{
	error::{RunError, SystemError},
	task::{report, ExecStatus, TaskState, TaskStatus, TaskWorkState, Unrun},
};

pub type WorkerId = usize;

pub(crate) async fn run<E: RunError>(
	worker_id: WorkerId,
	ready_rx: chan::Receiver<TaskWorkState<E>>,
	shutdown_rx: watch::Receiver<bool>,
) {
	trace!(%worker_id, "Worker started");

	while let Ok(work) = ready_rx.recv().await {
		let is_shutting_down = *shutdown_rx.borrow();

		if is_shutting_down || work.interrupter.is_interrupted() {
			work.finish_without_running(Unrun::Interrupted);
			continue;
		}

		run_single_task(worker_id, work).await;
	}

	trace!(%worker_id, "Worker stopped");
}

async fn run_single_task<E: RunError>(
	worker_id: WorkerId,
	TaskWorkState {
		mut task,
		done_tx,
		state_tx,
		interrupter,
	}: TaskWorkState<E>,
) {
	let task_id = task.id();
	let maybe_timeout = task.with_timeout();

	state_tx.send_replace(TaskState::Running);
	trace!(%worker_id, %task_id, "Running task");

	// Running on its own tokio task so a panicking task doesn't take the worker down with it
	let mut handle = spawn(
		async move {
			let res = task.run(&interrupter).await;
			(task, interrupter, res)
		}
		.in_current_span(),
	);

	let joined = if let Some(duration) = maybe_timeout {
		if let Ok(joined) = timeout(duration, &mut handle).await {
			joined
		} else {
			handle.abort();
			warn!(%task_id, ?duration, "Task timed out and was aborted");

			return report(
				task_id,
				done_tx,
				&state_tx,
				TaskState::Failed,
				Err(SystemError::TaskTimeout(task_id)),
			);
		}
	} else {
		handle.await
	};

	match joined {
		Ok((_, _, Ok(ExecStatus::Done(out)))) => {
			trace!(%worker_id, %task_id, "Task done");
			report(
				task_id,
				done_tx,
				&state_tx,
				TaskState::Succeeded,
				Ok(TaskStatus::Done((task_id, out))),
			);
		}

		Ok((task, interrupter, Ok(ExecStatus::Canceled))) => {
			if interrupter.is_shutting_down() {
				trace!(%worker_id, %task_id, "Task stopped due to shutdown, giving it back");
				report(
					task_id,
					done_tx,
					&state_tx,
					TaskState::Shutdown,
					Ok(TaskStatus::Shutdown(task)),
				);
			} else {
				trace!(%worker_id, %task_id, "Task canceled");
				report(
					task_id,
					done_tx,
					&state_tx,
					TaskState::Canceled,
					Ok(TaskStatus::Canceled),
				);
			}
		}

		Ok((_, _, Err(e))) => {
			debug!(%worker_id, %task_id, ?e, "Task failed");
			report(
				task_id,
				done_tx,
				&state_tx,
				TaskState::Failed,
				Ok(TaskStatus::Error(e)),
			);
		}

		Err(e) if e.is_panic() => {
			error!(%worker_id, %task_id, "Task panicked");
			report(
				task_id,
				done_tx,
				&state_tx,
				TaskState::Failed,
				Err(SystemError::TaskPanic(task_id)),
			);
		}

		Err(e) => {
			error!(%worker_id, %task_id, ?e, "Task was lost while running");
			report(
				task_id,
				done_tx,
				&state_tx,
				TaskState::Failed,
				Err(SystemError::TaskLost(task_id)),
			);
		}
	}
}
