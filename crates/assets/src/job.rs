use std::path::Path;

use cairn_task_system::TaskDispatcher;

use tracing::{debug, instrument};

use crate::{
	config::SyncConfig,
	error::Error,
	executor::SyncExecutor,
	fetch::Fetcher,
	manifest::Manifest,
	plan::{SyncPlan, SyncPlanner},
	report::SyncReport,
	verify::Sha1Verifier,
};

/// A whole sync pass: read the manifest, plan against the store, then execute the plan.
#[derive(Debug, Clone)]
pub struct AssetSyncJob {
	planner: SyncPlanner,
	executor: SyncExecutor,
	release_key: Option<String>,
}

impl AssetSyncJob {
	#[must_use]
	pub const fn new(planner: SyncPlanner, executor: SyncExecutor) -> Self {
		Self {
			planner,
			executor,
			release_key: None,
		}
	}

	/// Wires planner and executor as described by `config`.
	pub fn from_config(
		config: &SyncConfig,
		fetch_queue: TaskDispatcher<Error>,
		copy_queue: TaskDispatcher<Error>,
		fetcher: impl Fetcher,
	) -> Self {
		let planner = SyncPlanner::new(config.store_layout(), config.locator());

		let mut executor = SyncExecutor::new(fetch_queue, copy_queue, fetcher)
			.with_retry_policy(config.retry_policy());
		if config.verify_hashes {
			executor = executor.with_verifier(Sha1Verifier);
		}

		Self::new(planner, executor).with_release_key(config.release_key.clone())
	}

	#[must_use]
	pub fn with_release_key(mut self, release_key: Option<String>) -> Self {
		self.release_key = release_key;
		self
	}

	#[must_use]
	pub fn plan(&self, manifest: &Manifest) -> SyncPlan {
		let mode = manifest.layout_mode(self.release_key.as_deref());

		debug!(%mode, entries_count = manifest.len(), "Planning sync");

		self.planner.plan(manifest, &mode)
	}

	pub async fn plan_file(&self, manifest_path: impl AsRef<Path> + Send) -> Result<SyncPlan, Error> {
		let manifest = Manifest::from_file(manifest_path).await?;

		Ok(self.plan(&manifest))
	}

	#[instrument(skip_all, err)]
	pub async fn run(&self, manifest: &Manifest) -> Result<SyncReport, Error> {
		self.executor.execute(self.plan(manifest)).await
	}

	#[instrument(skip_all, fields(manifest_path = %manifest_path.as_ref().display()), err)]
	pub async fn run_file(
		&self,
		manifest_path: impl AsRef<Path> + Send,
	) -> Result<SyncReport, Error> {
		let manifest = Manifest::from_file(manifest_path).await?;

		self.run(&manifest).await
	}
}
