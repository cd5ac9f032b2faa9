use std::{collections::HashMap, sync::Arc};

use cairn_task_system::{
	TaskDispatcher, TaskHandle, TaskOutput, TaskRemoteController, TaskStatus, TaskSystemError,
};

use futures_concurrency::future::Join;
use tracing::{error, info, instrument, trace, warn};

use crate::{
	copy::{Copier, FsCopier},
	error::Error,
	fetch::Fetcher,
	plan::{PlanFailure, SyncPlan, WorkItem, WorkItemId},
	report::SyncReport,
	tasks::{EnsureObjectTask, EnsureOutcome, MaterializeTask, RetryPolicy},
	verify::{FileVerifier, SizeVerifier},
};

/// Runs a [`SyncPlan`] on two queues, one for fetches and one for copies.
///
/// Each copy is gated on the fetch of its entry, so a copy never starts before its object was
/// verified, and a failed fetch skips the copy without touching any other entry.
#[derive(Debug, Clone)]
pub struct SyncExecutor {
	fetch_queue: TaskDispatcher<Error>,
	copy_queue: TaskDispatcher<Error>,
	retry: RetryPolicy,

	verifier: Arc<dyn FileVerifier>,
	fetcher: Arc<dyn Fetcher>,
	copier: Arc<dyn Copier>,
}

impl SyncExecutor {
	pub fn new(
		fetch_queue: TaskDispatcher<Error>,
		copy_queue: TaskDispatcher<Error>,
		fetcher: impl Fetcher,
	) -> Self {
		Self {
			fetch_queue,
			copy_queue,
			retry: RetryPolicy::default(),
			verifier: Arc::new(SizeVerifier),
			fetcher: Arc::new(fetcher),
			copier: Arc::new(FsCopier),
		}
	}

	#[must_use]
	pub fn with_verifier(mut self, verifier: impl FileVerifier) -> Self {
		self.verifier = Arc::new(verifier);
		self
	}

	#[must_use]
	pub fn with_copier(mut self, copier: impl Copier) -> Self {
		self.copier = Arc::new(copier);
		self
	}

	#[must_use]
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	/// Dispatches every item of `plan` and waits for all of them.
	///
	/// Per entry failures, including the plan's own, end up in [`SyncReport::failures`]. Only a
	/// task system shutdown while dispatching fails the whole pass.
	#[instrument(
		skip_all,
		fields(layout = %plan.layout, items_count = plan.items.len()),
		err
	)]
	pub async fn execute(&self, plan: SyncPlan) -> Result<SyncReport, Error> {
		let SyncPlan {
			layout,
			items,
			already_materialized,
			failures,
		} = plan;

		let mut report = SyncReport::new(layout);
		report.already_materialized = already_materialized;
		report.failures = failures
			.into_iter()
			.map(|PlanFailure { error, .. }| error)
			.collect();

		let mut fetch_handles = Vec::new();
		let mut copy_handles = Vec::new();
		let mut fetch_controllers = HashMap::<WorkItemId, TaskRemoteController>::new();

		for item in items {
			match item {
				WorkItem::FetchOrVerify(fetch) => {
					let (id, entry) = (fetch.id, fetch.entry.clone());

					let handle = self
						.fetch_queue
						.dispatch(EnsureObjectTask::new(
							fetch,
							self.retry,
							Arc::clone(&self.verifier),
							Arc::clone(&self.fetcher),
						))
						.await?;

					fetch_controllers.insert(id, handle.remote_controller());
					fetch_handles.push((entry, handle));
				}

				WorkItem::Copy(copy) => {
					let Some(predecessor) = fetch_controllers.get(&copy.depends_on).cloned() else {
						error!(
							entry = %copy.entry,
							depends_on = ?copy.depends_on,
							"Copy item without a dispatched fetch, skipping it"
						);
						report.skipped_copies.push(copy.entry);
						continue;
					};

					let entry = copy.entry.clone();

					let handle = self
						.copy_queue
						.dispatch_after(
							MaterializeTask::new(copy, Arc::clone(&self.copier)),
							[predecessor],
						)
						.await?;

					copy_handles.push((entry, handle));
				}
			}
		}

		trace!(
			fetches = fetch_handles.len(),
			copies = copy_handles.len(),
			"Dispatched sync tasks"
		);

		for (entry, res) in wait_all(fetch_handles).await {
			fold_fetch(&mut report, entry, res);
		}

		for (entry, res) in wait_all(copy_handles).await {
			fold_copy(&mut report, entry, res);
		}

		info!(
			present = report.present.len(),
			fetched = report.fetched.len(),
			copied = report.copied.len(),
			already_materialized = report.already_materialized.len(),
			skipped_copies = report.skipped_copies.len(),
			failures = report.failures.len(),
			"Sync pass finished"
		);

		Ok(report)
	}
}

type TaskResult = Result<TaskStatus<Error>, TaskSystemError>;

async fn wait_all(handles: Vec<(String, TaskHandle<Error>)>) -> Vec<(String, TaskResult)> {
	handles
		.into_iter()
		.map(|(entry, handle)| async move { (entry, handle.await) })
		.collect::<Vec<_>>()
		.join()
		.await
}

fn fold_fetch(report: &mut SyncReport, entry: String, res: TaskResult) {
	match res {
		Ok(TaskStatus::Done((_, TaskOutput::Out(out)))) => match out.downcast::<EnsureOutcome>() {
			Ok(outcome) => match *outcome {
				EnsureOutcome::Present => report.present.push(entry),
				EnsureOutcome::Fetched { .. } => report.fetched.push(entry),
			},
			Err(_) => {
				error!(%entry, "Fetch task returned an unexpected output");
				report.failures.push(Error::UnexpectedOutput { entry });
			}
		},
		Ok(TaskStatus::Done((_, TaskOutput::Empty))) => {
			error!(%entry, "Fetch task returned no output");
			report.failures.push(Error::UnexpectedOutput { entry });
		}
		Ok(TaskStatus::Error(e)) => {
			warn!(%entry, %e, "Failed to ensure object");
			report.failures.push(e);
		}
		Ok(TaskStatus::Canceled | TaskStatus::Shutdown(_)) => {
			report.failures.push(Error::Interrupted { entry });
		}
		Ok(status @ TaskStatus::Skipped { .. }) => {
			error!(%entry, ?status, "Fetch task finished with an unexpected status");
			report.failures.push(Error::UnexpectedOutput { entry });
		}
		Err(source) => {
			warn!(%entry, %source, "Fetch task failed in the task system");
			report.failures.push(Error::TaskSystem { entry, source });
		}
	}
}

fn fold_copy(report: &mut SyncReport, entry: String, res: TaskResult) {
	match res {
		Ok(TaskStatus::Done(_)) => report.copied.push(entry),
		Ok(TaskStatus::Skipped {
			dependency_state, ..
		}) => {
			trace!(%entry, ?dependency_state, "Copy skipped as its object isn't available");
			report.skipped_copies.push(entry);
		}
		Ok(TaskStatus::Error(e)) => {
			warn!(%entry, %e, "Failed to materialize object");
			report.failures.push(e);
		}
		Ok(TaskStatus::Canceled | TaskStatus::Shutdown(_)) => {
			report.failures.push(Error::Interrupted { entry });
		}
		Err(source) => {
			warn!(%entry, %source, "Copy task failed in the task system");
			report.failures.push(Error::TaskSystem { entry, source });
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use cairn_task_system::{IntoAnyTaskOutput, TaskId};

	use crate::layout::LayoutMode;

	fn done(output: TaskOutput) -> TaskResult {
		Ok(TaskStatus::Done((TaskId::new_v4(), output)))
	}

	#[test]
	fn fetch_outcomes_land_in_their_buckets() {
		let mut report = SyncReport::new(LayoutMode::Flat);

		fold_fetch(&mut report, "a.ogg".into(), done(EnsureOutcome::Present.into_output()));
		fold_fetch(
			&mut report,
			"b.ogg".into(),
			done(EnsureOutcome::Fetched { attempts: 1, bytes: 3 }.into_output()),
		);

		assert_eq!(report.present, ["a.ogg"]);
		assert_eq!(report.fetched, ["b.ogg"]);
		assert!(report.failures.is_empty());
	}

	#[test]
	fn unexpected_fetch_output_is_a_failure() {
		let mut report = SyncReport::new(LayoutMode::Flat);

		fold_fetch(&mut report, "a.ogg".into(), done("not an outcome".into_output()));
		fold_fetch(&mut report, "b.ogg".into(), done(TaskOutput::Empty));

		assert!(report.present.is_empty());
		assert!(report.fetched.is_empty());
		assert_eq!(report.failed_entries().collect::<Vec<_>>(), ["a.ogg", "b.ogg"]);
		assert!(report
			.failures
			.iter()
			.all(|e| matches!(e, Error::UnexpectedOutput { .. })));
	}
}
