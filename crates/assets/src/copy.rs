use std::{fmt, path::Path};

use cairn_utils::error::FileIOError;

use async_trait::async_trait;
use tokio::fs;

/// Places a friendly-named copy of a verified store object, returning the bytes copied.
#[async_trait]
pub trait Copier: fmt::Debug + Send + Sync + 'static {
	async fn copy(&self, source: &Path, target: &Path) -> Result<u64, FileIOError>;
}

/// Plain filesystem copy, overwriting whatever sits at the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCopier;

#[async_trait]
impl Copier for FsCopier {
	async fn copy(&self, source: &Path, target: &Path) -> Result<u64, FileIOError> {
		fs::copy(source, target)
			.await
			.map_err(|e| FileIOError::from((target, e, "failed to copy store object")))
	}
}
