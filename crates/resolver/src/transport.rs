//! Repository access over `file://` and HTTP(S).

use jarlock_core::CredentialSource;
use reqwest::StatusCode;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::retry::Retryable;
use crate::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// A Maven repository root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Repository {
    url: Url,
}

impl Repository {
    /// Parse a repository URI, normalizing it to end with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRepository`] for unparsable URIs and schemes
    /// other than `http`, `https` and `file`.
    pub fn parse(uri: &str) -> Result<Self> {
        let mut url = Url::parse(uri.trim()).map_err(|e| Error::invalid_repository(uri, e.to_string()))?;
        match url.scheme() {
            "http" | "https" | "file" => {}
            other => {
                return Err(Error::invalid_repository(
                    uri,
                    format!("unsupported scheme '{other}'"),
                ));
            }
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self { url })
    }

    /// The normalized URI.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Host used for credential lookup.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Whether the repository lives on the local file system.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.url.scheme() == "file"
    }

    /// URL of a repository-relative path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRepository`] if the path cannot be joined.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.url
            .join(path)
            .map_err(|e| Error::invalid_repository(self.as_str(), e.to_string()))
    }

    /// File-system location of a repository-relative path, for `file://` repositories.
    #[must_use]
    pub fn local_path(&self, path: &str) -> Option<PathBuf> {
        if !self.is_local() {
            return None;
        }
        self.resolve(path).ok()?.to_file_path().ok()
    }

    /// Directory name keeping this repository's cached files apart from others.
    #[must_use]
    pub fn cache_namespace(&self) -> String {
        let raw = self.url.as_str().trim_end_matches('/');
        let raw = raw.split_once("://").map_or(raw, |(_, rest)| rest);
        raw.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The repository does not have the file.
    NotFound,
    /// A failure that may go away on retry (connect, timeout, 5xx, 408, 429).
    Transient(String),
    /// A failure that retrying will not fix (401, 403, unreadable file).
    Fatal(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Transient(message) | Self::Fatal(message) => f.write_str(message),
        }
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Fetches repository files, authenticating per host.
#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

impl Transport {
    /// Create a transport using `credentials` for HTTP basic auth.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("jarlock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            credentials,
        })
    }

    /// Fetch one repository-relative file.
    pub async fn fetch(&self, repository: &Repository, path: &str) -> std::result::Result<Vec<u8>, FetchError> {
        if repository.is_local() {
            return Self::fetch_local(repository, path).await;
        }
        self.fetch_http(repository, path).await
    }

    async fn fetch_local(repository: &Repository, path: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let Some(file) = repository.local_path(path) else {
            return Err(FetchError::Fatal(format!("cannot map {path} into {repository}")));
        };
        trace!(path = %file.display(), "Reading from local repository");
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchError::NotFound),
            Err(e) => Err(FetchError::Fatal(format!("{}: {e}", file.display()))),
        }
    }

    async fn fetch_http(&self, repository: &Repository, path: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let url = repository
            .resolve(path)
            .map_err(|e| FetchError::Fatal(e.to_string()))?;

        let mut request = self.client.get(url.clone());
        if let Some(credential) = repository
            .host()
            .and_then(|host| self.credentials.credential_for(host))
        {
            debug!(%url, credential = %credential, "Using repository credentials");
            request = request.basic_auth(
                credential.login.unwrap_or_default(),
                credential.password,
            );
        }

        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                FetchError::Fatal(format!("{url}: {e}"))
            } else {
                FetchError::Transient(format!("{url}: {e}"))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| FetchError::Transient(format!("{url}: {e}")))?;
            return Ok(bytes.to_vec());
        }

        Err(classify_status(status, &url))
    }
}

fn classify_status(status: StatusCode, url: &Url) -> FetchError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => FetchError::NotFound,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            FetchError::Transient(format!("{url}: HTTP {status}"))
        }
        s if s.is_server_error() => FetchError::Transient(format!("{url}: HTTP {status}")),
        _ => FetchError::Fatal(format!("{url}: HTTP {status}")),
    }
}
