//! Object storage for profile pictures

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object storage is not configured")]
    NotConfigured,
    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("storage rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key` and return the public locator
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;

    /// Remove the object behind a locator previously returned by `put`
    async fn delete(&self, locator: &str) -> Result<(), StorageError>;
}

/// `profile-pictures/<user id>-<random>.<ext>`
pub fn picture_key(user_id: Uuid, mime_type: &str) -> String {
    let ext = match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    };
    format!("profile-pictures/{}-{}.{}", user_id, Uuid::new_v4(), ext)
}

/// Bucket behind a plain HTTP object API (`PUT`/`DELETE {endpoint}/{bucket}/{key}`)
pub struct HttpObjectStorage {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
    public_base: String,
}

impl HttpObjectStorage {
    pub fn new(endpoint: String, bucket: String, token: Option<String>, public_url: Option<String>) -> Self {
        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let public_base = public_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("{}/{}", endpoint, bucket));

        Self {
            client,
            endpoint,
            bucket,
            token,
            public_base,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    fn key_for<'a>(&self, locator: &'a str) -> Option<&'a str> {
        locator
            .strip_prefix(self.public_base.as_str())
            .map(|rest| rest.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<(), StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        let url = self.object_url(key);
        tracing::debug!(%url, size = bytes.len(), "uploading object");

        let response = self
            .authorize(self.client.put(&url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await?;

        Ok(format!("{}/{}", self.public_base, key))
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        let Some(key) = self.key_for(locator) else {
            tracing::warn!(%locator, "locator does not belong to this bucket; skipping delete");
            return Ok(());
        };
        let response = self
            .authorize(self.client.delete(self.object_url(key)))
            .send()
            .await?;
        // A missing object is already in the desired state.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await
    }
}

/// Keeps objects in process memory
#[derive(Default)]
pub struct InMemoryStorage {
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

const MEMORY_SCHEME: &str = "memory://";

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, locator: &str) -> bool {
        match locator.strip_prefix(MEMORY_SCHEME) {
            Some(key) => self.objects.read().await.contains_key(key),
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        self.objects
            .write()
            .await
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(format!("{}{}", MEMORY_SCHEME, key))
    }

    async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        if let Some(key) = locator.strip_prefix(MEMORY_SCHEME) {
            self.objects.write().await.remove(key);
        }
        Ok(())
    }
}

/// Stand-in used when no storage endpoint is configured
pub struct DisabledStorage;

#[async_trait]
impl ObjectStorage for DisabledStorage {
    async fn put(&self, _key: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<String, StorageError> {
        Err(StorageError::NotConfigured)
    }

    async fn delete(&self, _locator: &str) -> Result<(), StorageError> {
        Err(StorageError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picture_keys_are_unique_and_typed() {
        let id = Uuid::new_v4();
        let a = picture_key(id, "image/png");
        let b = picture_key(id, "image/png");
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("profile-pictures/{}-", id)));
        assert!(a.ends_with(".png"));
        assert!(picture_key(id, "image/jpeg").ends_with(".jpg"));
    }

    #[test]
    fn http_locators_map_back_to_keys() {
        let storage = HttpObjectStorage::new(
            "https://objects.local/".to_string(),
            "avatars".to_string(),
            None,
            None,
        );
        assert_eq!(
            storage.object_url("profile-pictures/a.png"),
            "https://objects.local/avatars/profile-pictures/a.png"
        );
        assert_eq!(
            storage.key_for("https://objects.local/avatars/profile-pictures/a.png"),
            Some("profile-pictures/a.png")
        );
        assert_eq!(storage.key_for("https://elsewhere/a.png"), None);

        let cdn = HttpObjectStorage::new(
            "https://objects.local".to_string(),
            "avatars".to_string(),
            Some("t".to_string()),
            Some("https://cdn.local/".to_string()),
        );
        assert_eq!(cdn.key_for("https://cdn.local/profile-pictures/a.png"), Some("profile-pictures/a.png"));
    }

    #[tokio::test]
    async fn memory_storage_put_and_delete() {
        let storage = InMemoryStorage::new();
        let locator = storage
            .put("profile-pictures/a.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert!(storage.contains(&locator).await);

        storage.delete(&locator).await.unwrap();
        assert!(!storage.contains(&locator).await);
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn disabled_storage_refuses_uploads() {
        let err = DisabledStorage.put("k", vec![], "image/png").await.unwrap_err();
        assert_eq!(err.to_string(), "Object storage is not configured");
    }
}
