use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::{Error, Result};

/// Object storage capability. Keys follow the
/// `{namespace}/{tenant}/.../{title}` convention owned by `sift_domain`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
	async fn get(&self, key: &str) -> Result<Vec<u8>>;
	async fn delete(&self, key: &str) -> Result<()>;
	async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Client for an S3-style HTTP object gateway: objects live at
/// `{endpoint}/{bucket}/{key}`, listing is `GET {endpoint}/{bucket}?prefix=`
/// returning a JSON array of keys.
pub struct HttpObjectStore {
	client: Client,
	cfg: sift_config::ObjectStoreConfig,
}
impl HttpObjectStore {
	pub fn new(cfg: sift_config::ObjectStoreConfig) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { client, cfg })
	}

	fn object_url(&self, key: &str) -> String {
		format!("{}/{}/{}", self.cfg.endpoint, self.cfg.bucket, key)
	}

	fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
		match self.cfg.access_token.as_deref() {
			Some(token) => req.bearer_auth(token),
			None => req,
		}
	}
}
#[async_trait]
impl ObjectStore for HttpObjectStore {
	async fn get(&self, key: &str) -> Result<Vec<u8>> {
		let res = self.authorize(self.client.get(self.object_url(key))).send().await?;

		if !res.status().is_success() {
			return Err(Error::ObjectStore { key: key.to_string(), status: res.status().as_u16() });
		}

		Ok(res.bytes().await?.to_vec())
	}

	async fn delete(&self, key: &str) -> Result<()> {
		let res = self.authorize(self.client.delete(self.object_url(key))).send().await?;

		// Deleting an absent object is a no-op, matching bucket semantics.
		if !res.status().is_success() && res.status().as_u16() != 404 {
			return Err(Error::ObjectStore { key: key.to_string(), status: res.status().as_u16() });
		}

		Ok(())
	}

	async fn list(&self, prefix: &str) -> Result<Vec<String>> {
		let url = format!("{}/{}", self.cfg.endpoint, self.cfg.bucket);
		let res = self
			.authorize(self.client.get(url).query(&[("prefix", prefix)]))
			.send()
			.await?;

		if !res.status().is_success() {
			return Err(Error::ObjectStore {
				key: prefix.to_string(),
				status: res.status().as_u16(),
			});
		}

		let keys: Vec<String> = res.json().await?;

		Ok(keys)
	}
}
