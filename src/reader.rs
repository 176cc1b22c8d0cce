//! Readers fetch feature documents by relative path.
//!
//! Supported URIs:
//! - `fs:///abs/path` or a bare path: files under a local root
//! - `http://...` / `https://...`: documents under a base URL

use crate::error::FetchError;

use async_trait::async_trait;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Owned byte stream for one document. Released when dropped.
pub type FeatureStream = Pin<Box<dyn AsyncRead + Send>>;

/// Source of feature documents keyed by relative path.
#[async_trait]
pub trait Reader: Send + Sync {
    async fn read(&self, rel_path: &str) -> Result<FeatureStream, FetchError>;

    /// Human-readable location for log lines.
    fn describe(&self) -> String;
}

/// Read a whole document. The stream is dropped before returning on every path.
pub async fn read_all(reader: &dyn Reader, rel_path: &str) -> Result<Vec<u8>, FetchError> {
    let mut stream = reader.read(rel_path).await?;
    let mut body = Vec::new();
    stream
        .read_to_end(&mut body)
        .await
        .map_err(|source| FetchError::Io {
            path: rel_path.to_string(),
            source,
        })?;
    Ok(body)
}

/// Upper bound on one remote fetch, connection through body.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a reader from a URI.
pub fn new_reader(uri: &str) -> Result<Arc<dyn Reader>, FetchError> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return Ok(Arc::new(HttpReader::new(uri)?));
    }

    if let Some(path) = uri.strip_prefix("fs://") {
        return Ok(Arc::new(FsReader::new(path)));
    }

    if uri.is_empty() || uri.contains("://") {
        return Err(FetchError::UnsupportedReader(uri.to_string()));
    }

    Ok(Arc::new(FsReader::new(uri)))
}

/// Reads documents from a local directory tree.
#[derive(Debug, Clone)]
pub struct FsReader {
    root: PathBuf,
}

impl FsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Reader for FsReader {
    async fn read(&self, rel_path: &str) -> Result<FeatureStream, FetchError> {
        let path = self.root.join(rel_path);
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(path.display().to_string()))
            }
            Err(source) => Err(FetchError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    fn describe(&self) -> String {
        format!("fs://{}", self.root.display())
    }
}

/// Reads documents over HTTP from a base URL.
#[derive(Debug, Clone)]
pub struct HttpReader {
    base_url: String,
    client: reqwest::Client,
}

impl HttpReader {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        Self::with_timeout(base_url, HTTP_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| FetchError::Http {
                url: base_url.to_string(),
                message: error.to_string(),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Reader for HttpReader {
    async fn read(&self, rel_path: &str) -> Result<FeatureStream, FetchError> {
        let url = format!("{}/{}", self.base_url, rel_path.trim_start_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|error| FetchError::Http {
                url: url.clone(),
                message: error.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url));
        }

        if !response.status().is_success() {
            return Err(FetchError::Http {
                message: format!("unexpected status {}", response.status()),
                url,
            });
        }

        let body = response.bytes().await.map_err(|error| FetchError::Http {
            url: url.clone(),
            message: error.to_string(),
        })?;

        Ok(Box::pin(std::io::Cursor::new(body.to_vec())))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
