//! # Object Storage
//!
//! Bucket-style storage for product images.
//!
//! ```text
//!  put(key, bytes) ──► <root>/<bucket>/<key>
//!
//!  presigned_url(key, ttl)
//!      expires   = now + ttl (unix seconds)
//!      signature = hex(HMAC-SHA256(signing_key, "<key>|<expires>"))
//!      url       = <base>/api/images/<key>?expires=..&signature=..
//! ```
//!
//! The image route serves an object to anyone holding an unexpired URL with a
//! valid signature. Keys are restricted to `[A-Za-z0-9._-]` segments joined by
//! `/` so they can never escape the bucket directory.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::StorageConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Signing error: {0}")]
    Signing(String),
}

/// A stored object with its media type.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Checks a signature produced by [`ObjectStore::presigned_url`].
    fn verify(&self, key: &str, expires: i64, signature: &str) -> bool;
}

/// Media type inferred from the key's extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        });

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

// =============================================================================
// Local disk
// =============================================================================

/// Objects on local disk under `<root>/<bucket>/`.
pub struct LocalBucketStore {
    bucket_dir: PathBuf,
    signing_key: SecretString,
    public_base_url: String,
}

impl LocalBucketStore {
    pub fn new(config: &StorageConfig) -> Self {
        LocalBucketStore {
            bucket_dir: config.root.join(&config.bucket),
            signing_key: config.signing_key.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.bucket_dir.join(key))
    }

    fn sign(&self, key: &str, expires: i64) -> Result<String, StorageError> {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.expose_secret().as_bytes())
            .map_err(|e| StorageError::Signing(e.to_string()))?;
        mac.update(format!("{key}|{expires}").as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl ObjectStore for LocalBucketStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        debug!(key = %key, size = bytes.len(), "Stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(StoredObject {
                bytes,
                content_type: content_type_for_key(key),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        validate_key(key)?;
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2);
        let expires = Utc::now().timestamp().saturating_add(ttl_secs);
        let signature = self.sign(key, expires)?;

        Ok(format!(
            "{}/api/images/{}?expires={}&signature={}",
            self.public_base_url, key, expires, signature
        ))
    }

    fn verify(&self, key: &str, expires: i64, signature: &str) -> bool {
        if validate_key(key).is_err() || expires < Utc::now().timestamp() {
            return false;
        }
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.signing_key.expose_secret().as_bytes())
        else {
            return false;
        };
        mac.update(format!("{key}|{expires}").as_bytes());
        mac.verify_slice(&provided).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &std::path::Path) -> LocalBucketStore {
        LocalBucketStore::new(&StorageConfig {
            root: root.to_path_buf(),
            bucket: "product-images".to_string(),
            signing_key: SecretString::from("test-signing-key".to_string()),
            url_ttl: Duration::from_secs(60),
            public_base_url: "http://localhost:8080/".to_string(),
        })
    }

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        url.split(['?', '&'])
            .find_map(|part| part.strip_prefix(&format!("{name}=")))
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.put("products/p-1/a.png", b"png-bytes").await.unwrap();
        assert!(dir.path().join("product-images/products/p-1/a.png").exists());

        let object = store.get("products/p-1/a.png").await.unwrap().unwrap();
        assert_eq!(object.bytes, b"png-bytes");
        assert_eq!(object.content_type, "image/png");

        store.delete("products/p-1/a.png").await.unwrap();
        assert!(store.get("products/p-1/a.png").await.unwrap().is_none());
        store.delete("products/p-1/a.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        for key in ["../etc/passwd", "/abs.png", "a//b.png", "a/../b.png", "sp ace.png"] {
            assert!(matches!(
                store.put(key, b"x").await,
                Err(StorageError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn test_presigned_url_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let url = store
            .presigned_url("products/p-1/a.png", Duration::from_secs(60))
            .unwrap();
        assert!(url.starts_with("http://localhost:8080/api/images/products/p-1/a.png?"));

        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let signature = query_param(&url, "signature");

        assert!(store.verify("products/p-1/a.png", expires, signature));
        assert!(!store.verify("products/p-2/a.png", expires, signature));
        assert!(!store.verify("products/p-1/a.png", expires + 1, signature));
        assert!(!store.verify("products/p-1/a.png", expires, "zz"));
    }

    #[test]
    fn test_expired_signature_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let expired = Utc::now().timestamp() - 10;
        let signature = store.sign("a.png", expired).unwrap();
        assert!(!store.verify("a.png", expired, &signature));
    }
}
