use std::{fmt, io, path::Path};

use thiserror::Error;
use tracing::error;

/// Logs the error of a result nobody else is going to look at.
pub fn report_error(res: &Result<(), impl fmt::Display>) {
	if let Err(e) = res {
		error!("{e:#}");
	}
}

/// An I/O error tagged with the path it happened on, and what we were trying to do there.
#[derive(Error, Debug)]
pub struct FileIOError {
	pub path: Box<Path>,
	#[source]
	pub source: io::Error,
	pub maybe_context: Option<&'static str>,
}

impl fmt::Display for FileIOError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} <path='{}'>: {}",
			self.maybe_context.unwrap_or("file I/O error"),
			self.path.display(),
			self.source
		)
	}
}

impl<P: AsRef<Path>> From<(P, io::Error)> for FileIOError {
	fn from((path, source): (P, io::Error)) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: None,
		}
	}
}

impl<P: AsRef<Path>> From<(P, io::Error, &'static str)> for FileIOError {
	fn from((path, source, context): (P, io::Error, &'static str)) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: Some(context),
		}
	}
}
