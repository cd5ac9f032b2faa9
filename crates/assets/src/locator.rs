use crate::layout::fan_out;

pub const DEFAULT_RESOURCES_BASE_URL: &str = "https://resources.download.minecraft.net";

/// Maps a content hash to the URL its object is served from, mirroring the store fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
	base_url: String,
}

impl ResourceLocator {
	pub fn new(base_url: impl Into<String>) -> Self {
		let mut base_url = base_url.into();
		while base_url.ends_with('/') {
			base_url.pop();
		}

		Self { base_url }
	}

	#[must_use]
	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	#[must_use]
	pub fn url_for(&self, hash: &str) -> String {
		format!("{}/{}/{hash}", self.base_url, fan_out(hash))
	}
}

impl Default for ResourceLocator {
	fn default() -> Self {
		Self::new(DEFAULT_RESOURCES_BASE_URL)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn url_mirrors_store_fan_out() {
		assert_eq!(
			ResourceLocator::default().url_for("ab12ef"),
			"https://resources.download.minecraft.net/ab/ab12ef"
		);
	}

	#[test]
	fn trailing_slashes_are_ignored() {
		let locator = ResourceLocator::new("http://127.0.0.1:8080/objects//");

		assert_eq!(locator.base_url(), "http://127.0.0.1:8080/objects");
		assert_eq!(locator.url_for("00ff"), "http://127.0.0.1:8080/objects/00/00ff");
	}
}
