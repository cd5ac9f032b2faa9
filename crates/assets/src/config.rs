use std::{
	path::{Path, PathBuf},
	time::Duration,
};

use cairn_utils::{error::FileIOError, fs::create_parent_dirs};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument};

use crate::{layout::StoreLayout, locator::ResourceLocator, tasks::RetryPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error(transparent)]
	Io(#[from] FileIOError),
	#[error("failed to parse config file <path='{}'>: {source}", .path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
	#[error("failed to serialize config: {0}")]
	Serialize(#[source] serde_json::Error),
}

/// Sync settings, stored as JSON. Missing fields take their default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
	/// Root of the content-addressed store, also holding the virtual trees.
	pub store_root: PathBuf,
	pub resources_root: PathBuf,
	/// Names the virtual tree, `legacy` when unset.
	pub release_key: Option<String>,
	pub resources_base_url: String,
	/// Check SHA-1 digests on top of sizes.
	pub verify_hashes: bool,
	pub max_fetch_attempts: u32,
	pub retry_delay_ms: u64,
	pub fetch_workers: usize,
	pub copy_workers: usize,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			store_root: PathBuf::from("assets"),
			resources_root: PathBuf::from("resources"),
			release_key: None,
			resources_base_url: crate::locator::DEFAULT_RESOURCES_BASE_URL.to_string(),
			verify_hashes: false,
			max_fetch_attempts: crate::tasks::DEFAULT_MAX_ATTEMPTS,
			retry_delay_ms: 500,
			fetch_workers: 8,
			copy_workers: 2,
		}
	}
}

impl SyncConfig {
	/// Reads the config at `path`, falling back to defaults when there's no file yet.
	#[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
	pub async fn load(path: impl AsRef<Path> + Send) -> Result<Self, ConfigError> {
		let path = path.as_ref();

		let bytes = match fs::read(path).await {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!("No config file, using defaults");
				return Ok(Self::default());
			}
			Err(e) => return Err(FileIOError::from((path, e, "failed to read config file")).into()),
		};

		serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})
	}

	pub async fn save(&self, path: impl AsRef<Path> + Send) -> Result<(), ConfigError> {
		let path = path.as_ref();

		create_parent_dirs(path)?;

		let json = serde_json::to_vec_pretty(self).map_err(ConfigError::Serialize)?;

		fs::write(path, json)
			.await
			.map_err(|e| FileIOError::from((path, e, "failed to write config file")).into())
	}

	#[must_use]
	pub fn store_layout(&self) -> StoreLayout {
		StoreLayout::new(&self.store_root, &self.resources_root)
	}

	#[must_use]
	pub fn locator(&self) -> ResourceLocator {
		ResourceLocator::new(self.resources_base_url.as_str())
	}

	#[must_use]
	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy::new(
			self.max_fetch_attempts,
			Duration::from_millis(self.retry_delay_ms),
		)
	}
}
