use std::sync::Arc;

use cairn_task_system::{
	check_interruption, ExecStatus, Interrupter, IntoAnyTaskOutput, Task, TaskId,
};

use futures_concurrency::future::Race;
use tokio::time::sleep;
use tracing::{debug, instrument, trace, warn, Level};

use crate::{
	error::Error,
	fetch::{FetchError, Fetcher},
	plan::FetchItem,
	verify::{FileVerifier, Mismatch, VerifyOutcome},
};

use super::RetryPolicy;

/// What an [`EnsureObjectTask`] had to do for its object to be valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
	/// The store already held a valid object.
	Present,
	Fetched { attempts: u32, bytes: u64 },
}

enum AttemptFailure {
	Fetch(FetchError),
	Verify(Mismatch),
}

/// Verifies a store object and, when it's missing or corrupt, downloads it again.
#[derive(Debug)]
pub struct EnsureObjectTask {
	id: TaskId,
	item: FetchItem,
	retry: RetryPolicy,

	// Dependencies
	verifier: Arc<dyn FileVerifier>,
	fetcher: Arc<dyn Fetcher>,
}

impl EnsureObjectTask {
	#[must_use]
	pub fn new(
		item: FetchItem,
		retry: RetryPolicy,
		verifier: Arc<dyn FileVerifier>,
		fetcher: Arc<dyn Fetcher>,
	) -> Self {
		Self {
			id: TaskId::new_v4(),
			item,
			retry,
			verifier,
			fetcher,
		}
	}

	#[must_use]
	pub const fn item(&self) -> &FetchItem {
		&self.item
	}

	async fn verify(&self, size: u64) -> Result<VerifyOutcome, Error> {
		let FetchItem {
			entry,
			store_path,
			hash,
			..
		} = &self.item;

		self.verifier
			.verify(store_path, size, hash)
			.await
			.map_err(|source| Error::Verifier {
				entry: entry.clone(),
				source,
			})
	}
}

#[async_trait::async_trait]
impl Task<Error> for EnsureObjectTask {
	fn id(&self) -> TaskId {
		self.id
	}

	#[instrument(
		skip(self, interrupter),
		fields(
			task_id = %self.id,
			entry = %self.item.entry,
			store_path = %self.item.store_path.display(),
		),
		ret(level = Level::TRACE),
		err,
	)]
	#[allow(clippy::blocks_in_conditions)] // Due to `err` on `instrument` macro above
	async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, Error> {
		let FetchItem {
			entry,
			store_path,
			size,
			hash,
			url,
			..
		} = &self.item;

		if hash.get(..2).is_none() {
			return Err(Error::InvalidHash {
				entry: entry.clone(),
				hash: hash.clone(),
			});
		}

		let Ok(size) = u64::try_from(*size) else {
			return Err(Error::InvalidSize {
				entry: entry.clone(),
				size: *size,
			});
		};

		match self.verify(size).await? {
			VerifyOutcome::Valid => {
				trace!("Object already present");
				return Ok(ExecStatus::Done(EnsureOutcome::Present.into_output()));
			}
			VerifyOutcome::Missing => trace!("Object missing, fetching"),
			VerifyOutcome::Corrupt(mismatch) => debug!(%mismatch, "Object corrupt, fetching again"),
		}

		let mut attempts = 0;

		loop {
			check_interruption!(interrupter);

			attempts += 1;

			let failure = match self.fetcher.fetch(url, store_path).await {
				Ok(bytes) => match self.verify(size).await? {
					VerifyOutcome::Valid => {
						return Ok(ExecStatus::Done(
							EnsureOutcome::Fetched { attempts, bytes }.into_output(),
						));
					}
					VerifyOutcome::Missing => AttemptFailure::Verify(Mismatch::Missing),
					VerifyOutcome::Corrupt(mismatch) => AttemptFailure::Verify(mismatch),
				},
				Err(e) => AttemptFailure::Fetch(e),
			};

			if attempts >= self.retry.max_attempts() {
				return Err(match failure {
					AttemptFailure::Fetch(source) => Error::EntryFetchFailed {
						entry: entry.clone(),
						attempts,
						source,
					},
					AttemptFailure::Verify(mismatch) => Error::EntryVerifyFailed {
						entry: entry.clone(),
						attempts,
						mismatch,
					},
				});
			}

			match &failure {
				AttemptFailure::Fetch(e) => warn!(%attempts, ?e, "Fetch attempt failed, retrying"),
				AttemptFailure::Verify(mismatch) => {
					warn!(%attempts, %mismatch, "Fetched object is invalid, retrying");
				}
			}

			let slept = async {
				sleep(self.retry.delay()).await;
				false
			};
			let interrupted = async {
				interrupter.await;
				true
			};

			if (slept, interrupted).race().await {
				trace!("Interrupted while waiting to retry");
				return Ok(ExecStatus::Canceled);
			}
		}
	}
}
