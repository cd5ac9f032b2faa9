//! Reading the remote asset index.
//!
//! The index is a JSON document shaped like:
//!
//! ```json
//! {
//!   "virtual": true,
//!   "map_to_resources": false,
//!   "objects": {
//!     "sound/click.ogg": { "hash": "ab12ef...", "size": 2048 }
//!   }
//! }
//! ```
//!
//! Both flags are optional and default to `false`. Hash format and size positivity are not
//! checked here, that's up to whoever verifies the downloaded objects. Sizes are read as signed
//! integers so a single negative size only fails its own entry.

use std::{collections::BTreeMap, path::Path};

use cairn_utils::error::FileIOError;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::fs;
use tracing::{instrument, trace};

use crate::layout::LayoutMode;

const VIRTUAL_FIELD: &str = "virtual";
const MAP_TO_RESOURCES_FIELD: &str = "map_to_resources";
const OBJECTS_FIELD: &str = "objects";

#[derive(Debug, Error)]
pub enum ManifestError {
	#[error("manifest is not valid JSON: {0}")]
	Malformed(#[source] serde_json::Error),
	#[error("manifest root must be an object")]
	MissingRoot,
	#[error("manifest has no 'objects' field")]
	MissingObjects,
	#[error("manifest 'objects' field must be an object")]
	ObjectsNotAnObject,
	#[error("manifest flag must be a boolean <field='{0}'>")]
	InvalidFlag(&'static str),
	#[error("manifest entry is invalid <entry='{name}'>: {source}")]
	InvalidEntry {
		name: String,
		#[source]
		source: serde_json::Error,
	},
	#[error("failed to read manifest: {0}")]
	Io(#[from] FileIOError),
}

/// A single named asset, addressed in the store by its content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
	pub name: String,
	pub hash: String,
	pub size: i64,
}

#[derive(Debug, Deserialize)]
struct RawObject {
	hash: String,
	size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
	pub is_virtual: bool,
	pub map_to_resources: bool,
	entries: Vec<ManifestEntry>,
}

impl Manifest {
	pub fn from_slice(bytes: &[u8]) -> Result<Self, ManifestError> {
		let root = match serde_json::from_slice::<Value>(bytes).map_err(ManifestError::Malformed)? {
			Value::Object(root) => root,
			_ => return Err(ManifestError::MissingRoot),
		};

		let is_virtual = read_flag(&root, VIRTUAL_FIELD)?;
		let map_to_resources = read_flag(&root, MAP_TO_RESOURCES_FIELD)?;

		let objects = match root.get(OBJECTS_FIELD) {
			None | Some(Value::Null) => return Err(ManifestError::MissingObjects),
			Some(Value::Object(objects)) => objects,
			Some(_) => return Err(ManifestError::ObjectsNotAnObject),
		};

		// Sorted by name, so planning the same manifest twice always yields the same plan
		let entries = objects
			.iter()
			.map(|(name, object)| {
				RawObject::deserialize(object)
					.map(|RawObject { hash, size }| (name.clone(), (hash, size)))
					.map_err(|source| ManifestError::InvalidEntry {
						name: name.clone(),
						source,
					})
			})
			.collect::<Result<BTreeMap<_, _>, _>>()?
			.into_iter()
			.map(|(name, (hash, size))| ManifestEntry { name, hash, size })
			.collect::<Vec<_>>();

		trace!(
			entries_count = entries.len(),
			is_virtual,
			map_to_resources,
			"Parsed manifest"
		);

		Ok(Self {
			is_virtual,
			map_to_resources,
			entries,
		})
	}

	#[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
	pub async fn from_file(path: impl AsRef<Path> + Send) -> Result<Self, ManifestError> {
		let path = path.as_ref();

		let bytes = fs::read(path)
			.await
			.map_err(|e| FileIOError::from((path, e, "failed to read manifest file")))?;

		Self::from_slice(&bytes)
	}

	#[must_use]
	pub fn entries(&self) -> &[ManifestEntry] {
		&self.entries
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// The layout this manifest asks for, see [`LayoutMode::from_flags`].
	#[must_use]
	pub fn layout_mode(&self, release_key: Option<&str>) -> LayoutMode {
		LayoutMode::from_flags(self.is_virtual, self.map_to_resources, release_key)
	}
}

fn read_flag(root: &Map<String, Value>, field: &'static str) -> Result<bool, ManifestError> {
	match root.get(field) {
		None | Some(Value::Null) => Ok(false),
		Some(Value::Bool(flag)) => Ok(*flag),
		Some(_) => Err(ManifestError::InvalidFlag(field)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_flags_and_entries() {
		let manifest = Manifest::from_slice(
			br#"{
				"virtual": true,
				"objects": {
					"sound/click.ogg": { "hash": "ab12ef", "size": 2048 },
					"lang/en_us.json": { "hash": "00ff00", "size": 0 }
				}
			}"#,
		)
		.unwrap();

		assert!(manifest.is_virtual);
		assert!(!manifest.map_to_resources);
		assert_eq!(
			manifest.entries(),
			[
				ManifestEntry {
					name: "lang/en_us.json".into(),
					hash: "00ff00".into(),
					size: 0,
				},
				ManifestEntry {
					name: "sound/click.ogg".into(),
					hash: "ab12ef".into(),
					size: 2048,
				},
			]
		);
	}

	#[test]
	fn absent_and_null_flags_default_to_false() {
		let manifest =
			Manifest::from_slice(br#"{ "virtual": null, "objects": {} }"#).unwrap();

		assert!(!manifest.is_virtual);
		assert!(!manifest.map_to_resources);
		assert!(manifest.is_empty());
	}

	#[test]
	fn empty_hash_is_not_rejected_here() {
		let manifest =
			Manifest::from_slice(br#"{ "objects": { "a": { "hash": "", "size": 0 } } }"#)
				.unwrap();

		assert_eq!(manifest.entries()[0].hash, "");
	}

	#[test]
	fn rejects_structurally_invalid_manifests() {
		assert!(matches!(
			Manifest::from_slice(b"{ not json"),
			Err(ManifestError::Malformed(_))
		));
		assert!(matches!(
			Manifest::from_slice(b"null"),
			Err(ManifestError::MissingRoot)
		));
		assert!(matches!(
			Manifest::from_slice(b"[]"),
			Err(ManifestError::MissingRoot)
		));
		assert!(matches!(
			Manifest::from_slice(br#"{ "virtual": true }"#),
			Err(ManifestError::MissingObjects)
		));
		assert!(matches!(
			Manifest::from_slice(br#"{ "objects": [] }"#),
			Err(ManifestError::ObjectsNotAnObject)
		));
		assert!(matches!(
			Manifest::from_slice(br#"{ "map_to_resources": "yes", "objects": {} }"#),
			Err(ManifestError::InvalidFlag(MAP_TO_RESOURCES_FIELD))
		));
	}

	#[test]
	fn invalid_entry_names_the_entry() {
		let Err(ManifestError::InvalidEntry { name, .. }) = Manifest::from_slice(
			br#"{ "objects": { "icons/icon.png": { "hash": "ab", "size": "big" } } }"#,
		) else {
			panic!("non integer sizes must be rejected");
		};

		assert_eq!(name, "icons/icon.png");
	}

	#[test]
	fn negative_size_is_kept_for_its_entry_only() {
		let manifest = Manifest::from_slice(
			br#"{ "objects": {
				"neg.ogg": { "hash": "ab12", "size": -1 },
				"ok.ogg": { "hash": "cd34", "size": 1 }
			} }"#,
		)
		.unwrap();

		assert_eq!(manifest.len(), 2);
		assert_eq!(manifest.entries()[0].size, -1);
		assert_eq!(manifest.entries()[1].size, 1);
	}

	#[test]
	fn layout_mode_follows_flags() {
		let manifest = Manifest::from_slice(
			br#"{ "virtual": true, "map_to_resources": true, "objects": {} }"#,
		)
		.unwrap();

		assert_eq!(
			manifest.layout_mode(Some("1.12")),
			LayoutMode::Virtual {
				release_key: "1.12".into()
			}
		);
	}
}
