use std::{
	fmt,
	path::{Component, Path, PathBuf},
};

use serde::Serialize;
use thiserror::Error;

use crate::manifest::ManifestEntry;

/// Release key used for the virtual tree when the caller doesn't supply one.
pub const DEFAULT_RELEASE_KEY: &str = "legacy";

pub const OBJECTS_DIR: &str = "objects";
pub const VIRTUAL_DIR: &str = "virtual";

/// Where, if anywhere, a friendly-named copy of each stored object must be materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LayoutMode {
	/// Objects only live in the content-addressed store.
	Flat,
	/// Copies under `<store_root>/virtual/<release_key>/<name>`.
	Virtual { release_key: String },
	/// Copies under `<resources_root>/<name>`.
	ResourceMapped,
}

impl LayoutMode {
	/// `virtual` takes precedence over `map_to_resources` when a manifest sets both.
	#[must_use]
	pub fn from_flags(is_virtual: bool, map_to_resources: bool, release_key: Option<&str>) -> Self {
		if is_virtual {
			Self::Virtual {
				release_key: release_key
					.filter(|key| !key.is_empty())
					.unwrap_or(DEFAULT_RELEASE_KEY)
					.to_string(),
			}
		} else if map_to_resources {
			Self::ResourceMapped
		} else {
			Self::Flat
		}
	}

	#[must_use]
	pub const fn materializes(&self) -> bool {
		!matches!(self, Self::Flat)
	}
}

impl fmt::Display for LayoutMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Flat => write!(f, "flat"),
			Self::Virtual { release_key } => write!(f, "virtual ({release_key})"),
			Self::ResourceMapped => write!(f, "resource mapped"),
		}
	}
}

#[derive(Debug, Error)]
pub enum LayoutError {
	#[error("friendly name would escape its target directory <name='{0}'>")]
	UnsafeName(String),
	#[error("hash can't name a store object <hash='{0}'>")]
	UnsafeHash(String),
	#[error("release key would escape the virtual tree <release_key='{0}'>")]
	UnsafeReleaseKey(String),
}

/// Paths an entry occupies on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
	pub store_path: PathBuf,
	pub materialized: Option<PathBuf>,
}

/// Pure path arithmetic for the store, never touches the filesystem.
#[derive(Debug, Clone)]
pub struct StoreLayout {
	store_root: PathBuf,
	resources_root: PathBuf,
}

impl StoreLayout {
	pub fn new(store_root: impl Into<PathBuf>, resources_root: impl Into<PathBuf>) -> Self {
		Self {
			store_root: store_root.into(),
			resources_root: resources_root.into(),
		}
	}

	#[must_use]
	pub fn store_root(&self) -> &Path {
		&self.store_root
	}

	#[must_use]
	pub fn resources_root(&self) -> &Path {
		&self.resources_root
	}

	/// `<store_root>/objects/<fan-out>/<hash>`, see [`fan_out`].
	#[must_use]
	pub fn object_path(&self, hash: &str) -> PathBuf {
		self.store_root
			.join(OBJECTS_DIR)
			.join(fan_out(hash))
			.join(hash)
	}

	/// Paths of `entry` under `mode`.
	///
	/// Hashes may only hold alphanumeric characters, empty and short ones are let through as
	/// they can't leave the store either. Release keys and friendly names must stay below their
	/// root directory.
	pub fn resolve(
		&self,
		entry: &ManifestEntry,
		mode: &LayoutMode,
	) -> Result<ResolvedEntry, LayoutError> {
		if !entry.hash.chars().all(char::is_alphanumeric) {
			return Err(LayoutError::UnsafeHash(entry.hash.clone()));
		}

		let materialized = match mode {
			LayoutMode::Flat => None,
			LayoutMode::Virtual { release_key } => {
				let release_tree = contained_path(release_key)
					.ok_or_else(|| LayoutError::UnsafeReleaseKey(release_key.clone()))?;

				Some(
					self.store_root
						.join(VIRTUAL_DIR)
						.join(release_tree)
						.join(checked_name(&entry.name)?),
				)
			}
			LayoutMode::ResourceMapped => {
				Some(self.resources_root.join(checked_name(&entry.name)?))
			}
		};

		Ok(ResolvedEntry {
			store_path: self.object_path(&entry.hash),
			materialized,
		})
	}
}

/// Fan-out directory for a hash: its first two characters.
///
/// Hashes too short to have a two character prefix (or with a multi-byte character there) use
/// the whole hash, those are rejected later when their objects are fetched.
#[must_use]
pub fn fan_out(hash: &str) -> &str {
	hash.get(..2).unwrap_or(hash)
}

fn checked_name(name: &str) -> Result<&Path, LayoutError> {
	contained_path(name).ok_or_else(|| LayoutError::UnsafeName(name.to_string()))
}

/// `relative` as a path, if it's non empty and can't climb out of whatever it's joined onto.
fn contained_path(relative: &str) -> Option<&Path> {
	let path = Path::new(relative);

	(!relative.is_empty()
		&& path
			.components()
			.all(|component| matches!(component, Component::Normal(_) | Component::CurDir)))
	.then_some(path)
}
