use crate::config::{CodeLocation, RequestConfig};
use crate::errors::FetchError;
use log::debug;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

/// Loads compiled script bytes from a location string
pub trait ScriptSource: Send + Sync {
    fn load(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Reads scripts from the local filesystem, optionally relative to a base directory
#[derive(Debug, Clone, Default)]
pub struct FileScriptSource {
    base_dir: Option<PathBuf>,
}

impl FileScriptSource {
    pub fn new() -> Self {
        Self { base_dir: None }
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(location),
            None => PathBuf::from(location),
        }
    }
}

impl ScriptSource for FileScriptSource {
    async fn load(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(location);
        debug!("Reading script from {}", path.display());

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Downloads scripts over HTTP(S)
pub struct HttpScriptSource {
    client: reqwest::Client,
}

impl HttpScriptSource {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl ScriptSource for HttpScriptSource {
    async fn load(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        debug!("Downloading script from {location}");
        let response = self.client.get(location).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(location.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: location.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Picks the file or HTTP source according to a request's `codeLocation`
pub struct ConfiguredScriptSource {
    code_location: CodeLocation,
    file: FileScriptSource,
    http: HttpScriptSource,
}

impl ConfiguredScriptSource {
    pub fn for_request(config: &RequestConfig) -> Result<Self, FetchError> {
        Ok(Self {
            code_location: config.code_location,
            file: FileScriptSource::new(),
            http: HttpScriptSource::new()?,
        })
    }
}

impl ScriptSource for ConfiguredScriptSource {
    async fn load(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        match self.code_location {
            CodeLocation::Local => self.file.load(location).await,
            CodeLocation::Remote => self.http.load(location).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReturnType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_source_reads_bytes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("script.wasm"), b"\0asm\x01\0\0\0").unwrap();

        let source = FileScriptSource::with_base_dir(dir.path());
        let bytes = source.load("script.wasm").await.unwrap();
        assert_eq!(bytes, b"\0asm\x01\0\0\0");
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let dir = TempDir::new().unwrap();
        let source = FileScriptSource::with_base_dir(dir.path());

        match source.load("missing.wasm").await {
            Err(FetchError::NotFound(path)) => assert!(path.ends_with("missing.wasm")),
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_configured_source_uses_local_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local.wasm");
        std::fs::write(&path, b"local").unwrap();

        let config = RequestConfig::new(path.to_str().unwrap(), ReturnType::Bytes);
        let source = ConfiguredScriptSource::for_request(&config).unwrap();
        assert_eq!(source.load(&config.source).await.unwrap(), b"local");
    }

    #[tokio::test]
    async fn test_http_source_creation() {
        assert!(HttpScriptSource::new().is_ok());
        assert!(HttpScriptSource::with_timeout(Duration::from_secs(5)).is_ok());
    }

    /// This test requires network access.
    /// Run with: cargo test test_http_source_not_found -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_http_source_not_found() {
        let source = HttpScriptSource::new().unwrap();
        let result = source.load("https://example.com/no-such-script.wasm").await;
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }
}
