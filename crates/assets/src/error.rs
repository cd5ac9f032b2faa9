use cairn_task_system::{DispatcherShutdownError, TaskSystemError};
use cairn_utils::error::FileIOError;

use serde::Serializer;
use thiserror::Error;

use crate::{fetch::FetchError, layout::LayoutError, manifest::ManifestError, verify::Mismatch};

/// Error type shared by every task of a sync pass.
///
/// Everything but [`Error::Manifest`] and [`Error::Shutdown`] is attributed to a single manifest
/// entry, see [`Error::entry`], and only ever fails that entry.
#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Manifest(#[from] ManifestError),

	#[error("entry can't be laid out in the store <entry='{entry}'>: {source}")]
	Layout {
		entry: String,
		#[source]
		source: LayoutError,
	},
	#[error("failed to prepare directory <entry='{entry}'>: {source}")]
	CreateDir {
		entry: String,
		#[source]
		source: FileIOError,
	},
	#[error("hash is too short to address a store object <entry='{entry}', hash='{hash}'>")]
	InvalidHash { entry: String, hash: String },
	#[error("negative object size <entry='{entry}', size={size}>")]
	InvalidSize { entry: String, size: i64 },
	#[error("failed to fetch object <entry='{entry}', attempts={attempts}>: {source}")]
	EntryFetchFailed {
		entry: String,
		attempts: u32,
		#[source]
		source: FetchError,
	},
	#[error("fetched object failed verification <entry='{entry}', attempts={attempts}>: {mismatch}")]
	EntryVerifyFailed {
		entry: String,
		attempts: u32,
		mismatch: Mismatch,
	},
	#[error("failed to verify store object <entry='{entry}'>: {source}")]
	Verifier {
		entry: String,
		#[source]
		source: FileIOError,
	},
	#[error("failed to materialize object <entry='{entry}'>: {source}")]
	CopyFailed {
		entry: String,
		#[source]
		source: FileIOError,
	},
	#[error("task finished without reporting what it did <entry='{entry}'>")]
	UnexpectedOutput { entry: String },
	#[error("task was interrupted before finishing <entry='{entry}'>")]
	Interrupted { entry: String },
	#[error("task system shutdown while dispatching <pending_tasks={pending}>")]
	Shutdown { pending: usize },
	#[error("task system failed <entry='{entry}'>: {source}")]
	TaskSystem {
		entry: String,
		#[source]
		source: TaskSystemError,
	},
}

impl Error {
	/// Name of the manifest entry this error belongs to, if any.
	#[must_use]
	pub fn entry(&self) -> Option<&str> {
		match self {
			Self::Layout { entry, .. }
			| Self::CreateDir { entry, .. }
			| Self::InvalidHash { entry, .. }
			| Self::InvalidSize { entry, .. }
			| Self::EntryFetchFailed { entry, .. }
			| Self::EntryVerifyFailed { entry, .. }
			| Self::Verifier { entry, .. }
			| Self::CopyFailed { entry, .. }
			| Self::UnexpectedOutput { entry }
			| Self::Interrupted { entry }
			| Self::TaskSystem { entry, .. } => Some(entry),
			Self::Manifest(_) | Self::Shutdown { .. } => None,
		}
	}
}

impl From<DispatcherShutdownError<Self>> for Error {
	fn from(DispatcherShutdownError(tasks): DispatcherShutdownError<Self>) -> Self {
		Self::Shutdown {
			pending: tasks.len(),
		}
	}
}

pub(crate) fn serialize_display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
	T: std::fmt::Display,
	S: Serializer,
{
	serializer.collect_str(value)
}
