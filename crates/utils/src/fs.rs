use std::{fs, io, path::Path};

use tracing::trace;

use crate::error::FileIOError;

/// Creates every missing directory leading up to `path`, leaving `path` itself alone.
///
/// Calling it again for the same path is a no-op, and paths without a parent
/// (filesystem roots or bare relative names) are accepted as already satisfied.
pub fn create_parent_dirs(path: impl AsRef<Path>) -> Result<(), FileIOError> {
	let path = path.as_ref();

	let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) else {
		return Ok(());
	};

	match fs::create_dir_all(parent) {
		Ok(()) => {
			trace!(parent = %parent.display(), "Ensured parent directory");
			Ok(())
		}
		// Lost a race against a concurrent creator
		Err(e) if e.kind() == io::ErrorKind::AlreadyExists && parent.is_dir() => Ok(()),
		Err(e) => Err(FileIOError::from((
			parent,
			e,
			"failed to create parent directories",
		))),
	}
}
