//! Synchronizes a local content-addressed asset store against a remote asset index.
//!
//! Objects are stored once under `<store_root>/objects/<hash[0..2]>/<hash>`. Depending on the
//! index flags, a friendly-named copy of each object is also materialized, either in a per
//! release virtual tree or in a shared resources directory, see [`LayoutMode`].
//!
//! A pass is split in two: the [`SyncPlanner`] turns a [`Manifest`] into an immutable
//! [`SyncPlan`], then the [`SyncExecutor`] runs it on the task system, never starting a copy
//! before the fetch of its object succeeded.

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

pub mod config;
pub mod copy;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod job;
pub mod layout;
pub mod locator;
pub mod manifest;
pub mod plan;
pub mod report;
pub mod tasks;
pub mod verify;

pub use config::{ConfigError, SyncConfig};
pub use error::Error;
pub use executor::SyncExecutor;
pub use job::AssetSyncJob;
pub use layout::{LayoutMode, StoreLayout};
pub use locator::ResourceLocator;
pub use manifest::{Manifest, ManifestEntry, ManifestError};
pub use plan::{SyncPlan, SyncPlanner, WorkItem, WorkItemId};
pub use report::SyncReport;
