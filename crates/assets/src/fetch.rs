use std::{
	ffi::OsString,
	fmt, io,
	path::{Path, PathBuf},
	time::Duration,
};

use cairn_utils::error::{report_error, FileIOError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{
	fs::{self, File},
	io::AsyncWriteExt,
};
use tracing::{instrument, trace};
use uuid::Uuid;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum FetchError {
	#[error("request failed: {0}")]
	Request(#[from] reqwest::Error),
	#[error("server answered with an error <url='{url}', status={status}>")]
	Status { url: String, status: u16 },
	#[error(transparent)]
	Io(#[from] FileIOError),
}

/// Downloads a single object to `dest`, returning how many bytes were written.
///
/// Implementations must never leave a partially written file at `dest`, as whatever sits there
/// is taken for the object on the next verification.
#[async_trait]
pub trait Fetcher: fmt::Debug + Send + Sync + 'static {
	async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
	client: reqwest::Client,
}

impl HttpFetcher {
	pub fn new() -> Result<Self, FetchError> {
		let client = reqwest::Client::builder()
			.user_agent(USER_AGENT)
			.connect_timeout(CONNECT_TIMEOUT)
			.build()?;

		Ok(Self { client })
	}

	#[must_use]
	pub const fn with_client(client: reqwest::Client) -> Self {
		Self { client }
	}

	async fn download(&self, url: &str, part_path: &Path) -> Result<u64, FetchError> {
		let mut response = self.client.get(url).send().await?;

		let status = response.status();
		if !status.is_success() {
			return Err(FetchError::Status {
				url: url.to_string(),
				status: status.as_u16(),
			});
		}

		let mut file = File::create(part_path)
			.await
			.map_err(|e| FileIOError::from((part_path, e, "failed to create download file")))?;

		let mut written = 0;
		while let Some(chunk) = response.chunk().await? {
			file.write_all(&chunk)
				.await
				.map_err(|e| FileIOError::from((part_path, e, "failed to write download file")))?;
			written += chunk.len() as u64;
		}

		file.flush()
			.await
			.map_err(|e| FileIOError::from((part_path, e, "failed to flush download file")))?;

		Ok(written)
	}
}

#[async_trait]
impl Fetcher for HttpFetcher {
	#[instrument(skip(self, dest), fields(dest = %dest.display()), err)]
	async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
		// Concurrent fetches of the same object each get their own part file
		let part_path = part_path_for(dest);

		match self.download(url, &part_path).await {
			Ok(written) => {
				fs::rename(&part_path, dest).await.map_err(|e| {
					FileIOError::from((dest, e, "failed to move download into place"))
				})?;

				trace!(%written, "Fetched object");

				Ok(written)
			}
			Err(e) => {
				report_error(&remove_part_file(&part_path).await);

				Err(e)
			}
		}
	}
}

async fn remove_part_file(part_path: &Path) -> Result<(), FileIOError> {
	match fs::remove_file(part_path).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(FileIOError::from((
			part_path,
			e,
			"failed to clean up partial download",
		))),
	}
}

fn part_path_for(dest: &Path) -> PathBuf {
	let mut file_name = dest
		.file_name()
		.map_or_else(|| OsString::from("object"), ToOwned::to_owned);
	file_name.push(format!(".{}.part", Uuid::new_v4()));

	dest.with_file_name(file_name)
}
