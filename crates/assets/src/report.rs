use serde::{Serialize, Serializer};

use crate::{error::Error, layout::LayoutMode};

/// Outcome of a sync pass, listing entries by what happened to them.
#[derive(Debug, Serialize)]
pub struct SyncReport {
	pub layout: LayoutMode,
	/// Objects that were already valid in the store.
	pub present: Vec<String>,
	pub fetched: Vec<String>,
	pub copied: Vec<String>,
	pub already_materialized: Vec<String>,
	/// Copies that never ran because their object couldn't be ensured.
	pub skipped_copies: Vec<String>,
	#[serde(serialize_with = "serialize_failures")]
	pub failures: Vec<Error>,
}

impl SyncReport {
	#[must_use]
	pub const fn new(layout: LayoutMode) -> Self {
		Self {
			layout,
			present: Vec::new(),
			fetched: Vec::new(),
			copied: Vec::new(),
			already_materialized: Vec::new(),
			skipped_copies: Vec::new(),
			failures: Vec::new(),
		}
	}

	#[must_use]
	pub fn is_success(&self) -> bool {
		self.failures.is_empty()
	}

	/// Entries named by any failure.
	pub fn failed_entries(&self) -> impl Iterator<Item = &str> {
		self.failures.iter().filter_map(Error::entry)
	}
}

fn serialize_failures<S: Serializer>(failures: &[Error], serializer: S) -> Result<S::Ok, S::Error> {
	#[derive(Serialize)]
	struct Failure<'a> {
		entry: Option<&'a str>,
		error: String,
	}

	serializer.collect_seq(failures.iter().map(|error| Failure {
		entry: error.entry(),
		error: error.to_string(),
	}))
}
