//! Turning a manifest into an ordered list of work items.
//!
//! Planning is synchronous and runs on a single thread. Its only side effects are creating the
//! directories that items of the plan will write into, everything else is left to the executor.

use std::path::PathBuf;

use cairn_utils::fs::create_parent_dirs;

use serde::Serialize;
use tracing::{debug, instrument, trace, warn};

use crate::{
	error::{serialize_display, Error},
	layout::{LayoutMode, ResolvedEntry, StoreLayout},
	locator::ResourceLocator,
	manifest::{Manifest, ManifestEntry},
};

/// Position of an item inside its [`SyncPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WorkItemId(pub usize);

/// Make sure the store holds a valid copy of an object, downloading it if needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchItem {
	pub id: WorkItemId,
	pub entry: String,
	pub store_path: PathBuf,
	/// As read from the manifest, a negative size fails the fetch without a network call.
	pub size: i64,
	pub hash: String,
	pub url: String,
}

/// Copy a store object to its friendly-named location, only once `depends_on` succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyItem {
	pub id: WorkItemId,
	pub entry: String,
	pub source: PathBuf,
	pub target: PathBuf,
	pub depends_on: WorkItemId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItem {
	FetchOrVerify(FetchItem),
	Copy(CopyItem),
}

impl WorkItem {
	#[must_use]
	pub const fn id(&self) -> WorkItemId {
		match self {
			Self::FetchOrVerify(FetchItem { id, .. }) | Self::Copy(CopyItem { id, .. }) => *id,
		}
	}

	#[must_use]
	pub fn entry(&self) -> &str {
		match self {
			Self::FetchOrVerify(FetchItem { entry, .. }) | Self::Copy(CopyItem { entry, .. }) => {
				entry
			}
		}
	}
}

/// An entry that couldn't be planned. It contributes no items to the plan.
#[derive(Debug, Serialize)]
pub struct PlanFailure {
	pub entry: String,
	#[serde(serialize_with = "serialize_display")]
	pub error: Error,
}

#[derive(Debug, Serialize)]
pub struct SyncPlan {
	pub layout: LayoutMode,
	pub items: Vec<WorkItem>,
	/// Entries whose friendly-named target already existed, so no copy was planned for them.
	pub already_materialized: Vec<String>,
	pub failures: Vec<PlanFailure>,
}

impl SyncPlan {
	#[must_use]
	pub fn fetch_count(&self) -> usize {
		self.items
			.iter()
			.filter(|item| matches!(item, WorkItem::FetchOrVerify(_)))
			.count()
	}

	#[must_use]
	pub fn copy_count(&self) -> usize {
		self.items.len() - self.fetch_count()
	}
}

enum Target {
	None,
	Existing,
	Pending(PathBuf),
}

#[derive(Debug, Clone)]
pub struct SyncPlanner {
	layout: StoreLayout,
	locator: ResourceLocator,
}

impl SyncPlanner {
	#[must_use]
	pub const fn new(layout: StoreLayout, locator: ResourceLocator) -> Self {
		Self { layout, locator }
	}

	#[must_use]
	pub const fn layout(&self) -> &StoreLayout {
		&self.layout
	}

	#[instrument(skip_all, fields(entries_count = manifest.len(), %mode))]
	pub fn plan(&self, manifest: &Manifest, mode: &LayoutMode) -> SyncPlan {
		let mut plan = SyncPlan {
			layout: mode.clone(),
			items: Vec::with_capacity(manifest.len() * if mode.materializes() { 2 } else { 1 }),
			already_materialized: Vec::new(),
			failures: Vec::new(),
		};

		for entry in manifest.entries() {
			// Side effects for an entry all happen before any of its items are pushed
			let (store_path, target) = match self.prepare(entry, mode) {
				Ok(prepared) => prepared,
				Err(error) => {
					warn!(entry = %entry.name, %error, "Failed to plan entry");
					plan.failures.push(PlanFailure {
						entry: entry.name.clone(),
						error,
					});
					continue;
				}
			};

			let fetch_id = WorkItemId(plan.items.len());
			plan.items.push(WorkItem::FetchOrVerify(FetchItem {
				id: fetch_id,
				entry: entry.name.clone(),
				store_path: store_path.clone(),
				size: entry.size,
				hash: entry.hash.clone(),
				url: self.locator.url_for(&entry.hash),
			}));

			match target {
				Target::None => {}
				Target::Existing => plan.already_materialized.push(entry.name.clone()),
				Target::Pending(target) => plan.items.push(WorkItem::Copy(CopyItem {
					id: WorkItemId(plan.items.len()),
					entry: entry.name.clone(),
					source: store_path,
					target,
					depends_on: fetch_id,
				})),
			}
		}

		debug!(
			fetches = plan.fetch_count(),
			copies = plan.copy_count(),
			already_materialized = plan.already_materialized.len(),
			failures = plan.failures.len(),
			"Planned sync"
		);

		plan
	}

	fn prepare(&self, entry: &ManifestEntry, mode: &LayoutMode) -> Result<(PathBuf, Target), Error> {
		let ResolvedEntry {
			store_path,
			materialized,
		} = self
			.layout
			.resolve(entry, mode)
			.map_err(|source| Error::Layout {
				entry: entry.name.clone(),
				source,
			})?;

		create_parent_dirs(&store_path).map_err(|source| Error::CreateDir {
			entry: entry.name.clone(),
			source,
		})?;

		let target = match materialized {
			None => Target::None,
			Some(target) if target.exists() => {
				trace!(entry = %entry.name, target = %target.display(), "Target already exists");
				Target::Existing
			}
			Some(target) => {
				create_parent_dirs(&target).map_err(|source| Error::CreateDir {
					entry: entry.name.clone(),
					source,
				})?;
				Target::Pending(target)
			}
		};

		Ok((store_path, target))
	}
}
