use std::{fmt, io, path::Path};

use cairn_utils::error::FileIOError;

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use thiserror::Error;
use tokio::{
	fs::{self, File},
	io::AsyncReadExt,
};
use tracing::trace;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Why an object on disk doesn't match its manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Mismatch {
	#[error("object is missing")]
	Missing,
	#[error("object is not a regular file")]
	NotAFile,
	#[error("size mismatch <expected={expected}, actual={actual}>")]
	Size { expected: u64, actual: u64 },
	#[error("hash mismatch <expected='{expected}', actual='{actual}'>")]
	Hash { expected: String, actual: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
	Valid,
	Missing,
	Corrupt(Mismatch),
}

impl VerifyOutcome {
	#[must_use]
	pub const fn is_valid(&self) -> bool {
		matches!(self, Self::Valid)
	}
}

/// Decides whether the file at `path` already holds the expected object.
///
/// I/O errors other than the file not existing are returned as errors, a missing file is
/// [`VerifyOutcome::Missing`].
#[async_trait]
pub trait FileVerifier: fmt::Debug + Send + Sync + 'static {
	async fn verify(&self, path: &Path, size: u64, hash: &str)
		-> Result<VerifyOutcome, FileIOError>;
}

/// Only checks that a regular file of the expected size exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeVerifier;

#[async_trait]
impl FileVerifier for SizeVerifier {
	async fn verify(
		&self,
		path: &Path,
		size: u64,
		_hash: &str,
	) -> Result<VerifyOutcome, FileIOError> {
		let metadata = match fs::metadata(path).await {
			Ok(metadata) => metadata,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(VerifyOutcome::Missing),
			Err(e) => return Err(FileIOError::from((path, e, "failed to read object metadata"))),
		};

		if !metadata.is_file() {
			return Ok(VerifyOutcome::Corrupt(Mismatch::NotAFile));
		}

		if metadata.len() != size {
			return Ok(VerifyOutcome::Corrupt(Mismatch::Size {
				expected: size,
				actual: metadata.len(),
			}));
		}

		Ok(VerifyOutcome::Valid)
	}
}

/// Size check first, then a full SHA-1 of the content compared against the expected hex digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha1Verifier;

#[async_trait]
impl FileVerifier for Sha1Verifier {
	async fn verify(
		&self,
		path: &Path,
		size: u64,
		hash: &str,
	) -> Result<VerifyOutcome, FileIOError> {
		let outcome = SizeVerifier.verify(path, size, hash).await?;
		if !outcome.is_valid() {
			return Ok(outcome);
		}

		let actual = sha1_hex(path).await?;

		if actual.eq_ignore_ascii_case(hash) {
			Ok(VerifyOutcome::Valid)
		} else {
			trace!(path = %path.display(), %actual, expected = hash, "Hash mismatch");

			Ok(VerifyOutcome::Corrupt(Mismatch::Hash {
				expected: hash.to_string(),
				actual,
			}))
		}
	}
}

async fn sha1_hex(path: &Path) -> Result<String, FileIOError> {
	let mut file = File::open(path)
		.await
		.map_err(|e| FileIOError::from((path, e, "failed to open object for hashing")))?;

	let mut hasher = Sha1::new();
	let mut buf = vec![0; READ_BUFFER_SIZE];

	loop {
		let read = file
			.read(&mut buf)
			.await
			.map_err(|e| FileIOError::from((path, e, "failed to read object for hashing")))?;

		if read == 0 {
			break;
		}

		hasher.update(&buf[..read]);
	}

	Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
	use super::*;

	use tempfile::tempdir;

	const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

	#[tokio::test]
	async fn missing_file_is_missing() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("nope");

		assert_eq!(
			SizeVerifier.verify(&path, 5, HELLO_SHA1).await.unwrap(),
			VerifyOutcome::Missing
		);
		assert_eq!(
			Sha1Verifier.verify(&path, 5, HELLO_SHA1).await.unwrap(),
			VerifyOutcome::Missing
		);
	}

	#[tokio::test]
	async fn size_verifier_checks_length_only() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("object");
		fs::write(&path, b"hello").await.unwrap();

		assert!(SizeVerifier
			.verify(&path, 5, "not even a hash")
			.await
			.unwrap()
			.is_valid());
		assert_eq!(
			SizeVerifier.verify(&path, 6, HELLO_SHA1).await.unwrap(),
			VerifyOutcome::Corrupt(Mismatch::Size {
				expected: 6,
				actual: 5
			})
		);
	}

	#[tokio::test]
	async fn directories_are_not_objects() {
		let dir = tempdir().unwrap();

		assert_eq!(
			SizeVerifier.verify(dir.path(), 0, "").await.unwrap(),
			VerifyOutcome::Corrupt(Mismatch::NotAFile)
		);
	}

	#[tokio::test]
	async fn sha1_verifier_compares_digests() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("object");
		fs::write(&path, b"hello").await.unwrap();

		assert!(Sha1Verifier
			.verify(&path, 5, HELLO_SHA1)
			.await
			.unwrap()
			.is_valid());
		assert!(Sha1Verifier
			.verify(&path, 5, &HELLO_SHA1.to_uppercase())
			.await
			.unwrap()
			.is_valid());

		fs::write(&path, b"jello").await.unwrap();

		assert!(matches!(
			Sha1Verifier.verify(&path, 5, HELLO_SHA1).await.unwrap(),
			VerifyOutcome::Corrupt(Mismatch::Hash { expected, .. }) if expected == HELLO_SHA1
		));
	}
}
