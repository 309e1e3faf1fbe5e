use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// On-disk cache of REST response bodies, one file per URL.
///
/// Any I/O or decode problem is a miss; the cache never fails a request.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

#[derive(Serialize, Deserialize)]
struct CachedResponse {
    stored_at: DateTime<Utc>,
    body: String,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// `<platform cache dir>/github-file-finding`, if the platform has one.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("github-file-finding"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        let cached: CachedResponse = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                debug!("Discarding unreadable cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        let age = Utc::now().signed_duration_since(cached.stored_at);
        if age.to_std().map_or(true, |age| age > self.ttl) {
            debug!("Cache entry expired for {}", key);
            return None;
        }

        debug!("Cache hit for {}", key);
        Some(cached.body)
    }

    pub async fn put(&self, key: &str, body: &str) {
        if let Err(e) = self.write(key, body).await {
            debug!("Failed to cache response for {}: {}", key, e);
        }
    }

    async fn write(&self, key: &str, body: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let cached = CachedResponse {
            stored_at: Utc::now(),
            body: body.to_string(),
        };
        let json = serde_json::to_string(&cached)?;

        // Write-then-rename so concurrent readers never see a partial entry.
        let path = self.path_for(key);
        let tmp = path.with_extension(format!("tmp{}", std::process::id()));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name(key))
    }
}

/// A readable prefix of the key plus a SHA-256 digest of the whole key.
fn file_name(key: &str) -> String {
    let readable: String = key
        .trim_start_matches("https://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(80)
        .collect();
    format!("{}-{}.json", readable, key_digest(key))
}

fn key_digest(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}
