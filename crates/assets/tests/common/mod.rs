#![allow(dead_code)]

use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	sync::{Arc, Mutex},
	time::Duration,
};

use cairn_assets::{
	copy::{Copier, FsCopier},
	fetch::{FetchError, Fetcher},
	locator::ResourceLocator,
	Manifest,
};
use cairn_utils::error::FileIOError;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::{fs, time::sleep};

pub const BASE_URL: &str = "http://assets.test";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	Fetched(PathBuf),
	Copied { source: PathBuf, target: PathBuf },
}

pub type Journal = Arc<Mutex<Vec<Event>>>;

/// Serves objects from memory, recording every completed fetch in the journal.
#[derive(Debug, Clone)]
pub struct FakeFetcher {
	objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
	calls: Arc<Mutex<HashMap<String, u32>>>,
	delay: Duration,
	journal: Journal,
}

impl FakeFetcher {
	pub fn new(journal: &Journal) -> Self {
		Self {
			objects: Arc::default(),
			calls: Arc::default(),
			delay: Duration::ZERO,
			journal: Arc::clone(journal),
		}
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	pub fn serve(&self, hash: &str, content: &[u8]) {
		self.objects
			.lock()
			.unwrap()
			.insert(ResourceLocator::new(BASE_URL).url_for(hash), content.to_vec());
	}

	pub fn calls_for(&self, hash: &str) -> u32 {
		self.calls
			.lock()
			.unwrap()
			.get(&ResourceLocator::new(BASE_URL).url_for(hash))
			.copied()
			.unwrap_or_default()
	}

	pub fn total_calls(&self) -> u32 {
		self.calls.lock().unwrap().values().sum()
	}
}

#[async_trait]
impl Fetcher for FakeFetcher {
	async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
		let call = {
			let mut calls = self.calls.lock().unwrap();
			let call = calls.entry(url.to_string()).or_default();
			*call += 1;
			*call
		};

		if !self.delay.is_zero() {
			sleep(self.delay).await;
		}

		let content = self.objects.lock().unwrap().get(url).cloned();

		let Some(content) = content else {
			return Err(FetchError::Status {
				url: url.to_string(),
				status: 404,
			});
		};

		// Written aside and renamed like the real fetcher, so fetches of one hash can overlap
		let part_path = dest.with_extension(format!("{call}.part"));
		fs::write(&part_path, &content)
			.await
			.map_err(|e| FileIOError::from((&part_path, e)))?;
		fs::rename(&part_path, dest)
			.await
			.map_err(|e| FileIOError::from((dest, e)))?;

		self.journal
			.lock()
			.unwrap()
			.push(Event::Fetched(dest.to_path_buf()));

		Ok(content.len() as u64)
	}
}

/// Filesystem copies, recorded in the journal when they start.
#[derive(Debug, Clone)]
pub struct JournalCopier {
	journal: Journal,
}

impl JournalCopier {
	pub fn new(journal: &Journal) -> Self {
		Self {
			journal: Arc::clone(journal),
		}
	}
}

#[async_trait]
impl Copier for JournalCopier {
	async fn copy(&self, source: &Path, target: &Path) -> Result<u64, FileIOError> {
		self.journal.lock().unwrap().push(Event::Copied {
			source: source.to_path_buf(),
			target: target.to_path_buf(),
		});

		FsCopier.copy(source, target).await
	}
}

/// Builds a manifest from `(name, hash, content)` triples, sizes taken from the content.
pub fn manifest(flags: Value, objects: &[(&str, &str, &[u8])]) -> Manifest {
	let mut root = match flags {
		Value::Object(root) => root,
		_ => Map::new(),
	};

	root.insert(
		"objects".into(),
		objects
			.iter()
			.map(|(name, hash, content)| {
				(
					(*name).to_string(),
					json!({ "hash": hash, "size": content.len() }),
				)
			})
			.collect::<Map<_, _>>()
			.into(),
	);

	Manifest::from_slice(&serde_json::to_vec(&root).unwrap()).unwrap()
}

pub fn object_path(store_root: &Path, hash: &str) -> PathBuf {
	store_root.join("objects").join(&hash[..2]).join(hash)
}
