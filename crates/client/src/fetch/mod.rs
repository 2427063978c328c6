//! HTTP fetch of the remote datasets.
//!
//! ### CSV sources
//! - GET, fail on non-2xx, parse the body as CSV with a header row.
//! - The `Last-Modified` header, when present, is reported as the data's
//!   last update.
//!
//! ### File downloads
//! - Streamed to `<dest>.part` through a 2.5 MiB buffer, then renamed over
//!   `dest`, so a failed download never leaves a truncated file behind.

pub mod boundary;
pub mod url;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, Url, header};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::{AsyncWriteExt, BufWriter};

pub use boundary::{BoundaryFetcher, BoundaryOutcome, parse_features};
pub use url::{UrlError, parse_source_url};

use covidmap_core::{AppConfig, Error};

use crate::table::Table;

/// Write buffer size for streamed downloads (256 × 10 KiB).
pub const DOWNLOAD_CHUNK_BYTES: usize = 256 * 10240;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "covidmap/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "covidmap/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() }
    }
}

/// A parsed CSV dataset.
#[derive(Debug, Clone)]
pub struct FetchedTable {
    /// The URL requested
    pub url: Url,
    /// Parsed rows
    pub table: Table,
    /// `Last-Modified` response header, if sent and parseable
    pub last_modified: Option<DateTime<Utc>>,
    /// Time taken to fetch and parse in milliseconds
    pub fetch_ms: u64,
}

/// HTTP client for dataset sources.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    async fn get(&self, url_str: &str, accept: &str) -> Result<(Url, Response), Error> {
        let url = parse_source_url(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, accept)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("{url}: status {}", status.as_u16())));
        }

        Ok((url, response))
    }

    /// Fetch a CSV dataset and parse it into a table.
    pub async fn fetch_table(&self, url_str: &str) -> Result<FetchedTable, Error> {
        let start = Instant::now();
        let (url, response) = self.get(url_str, "text/csv,text/plain;q=0.9,*/*;q=0.8").await?;

        let last_modified = parse_last_modified(response.headers());
        let body: Bytes = response.bytes().await.map_err(request_error)?;
        let table = Table::from_csv(&body)?;

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "fetched {} in {}ms ({} bytes, {} rows)",
            url,
            fetch_ms,
            body.len(),
            table.len()
        );

        Ok(FetchedTable { url, table, last_modified, fetch_ms })
    }

    /// Stream a remote file to `dest`, returning the number of bytes written.
    ///
    /// On any failure the partial file is removed and `dest` is untouched.
    pub async fn download_to(&self, url_str: &str, dest: &Path) -> Result<u64, Error> {
        let (bytes, ()) = self.download_verified(url_str, dest, |_| Ok(())).await?;
        Ok(bytes)
    }

    /// [`download_to`](Self::download_to), with `verify` run over the complete
    /// staged payload before it replaces `dest`.
    ///
    /// A `verify` error counts as a failed download; whatever it returns on
    /// success is handed back with the byte count.
    pub async fn download_verified<T>(
        &self,
        url_str: &str,
        dest: &Path,
        verify: impl FnOnce(&[u8]) -> Result<T, Error>,
    ) -> Result<(u64, T), Error> {
        let (url, mut response) = self.get(url_str, "application/json,*/*;q=0.8").await?;

        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part = partial_path(dest);
        let written = async {
            let file = tokio::fs::File::create(&part).await?;
            let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_BYTES, file);
            let mut written = 0u64;
            while let Some(chunk) = response.chunk().await.map_err(request_error)? {
                writer.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            writer.flush().await?;
            writer.into_inner().sync_all().await?;
            let checked = verify(&tokio::fs::read(&part).await?)?;
            tokio::fs::rename(&part, dest).await?;
            Ok::<(u64, T), Error>((written, checked))
        }
        .await;

        match written {
            Ok((bytes, checked)) => {
                tracing::info!(url = %url, path = %dest.display(), bytes, "downloaded file");
                Ok((bytes, checked))
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&part).await
                    && cleanup.kind() != std::io::ErrorKind::NotFound
                {
                    tracing::warn!(path = %part.display(), error = %cleanup, "failed to remove partial download");
                }
                Err(e)
            }
        }
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn request_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::HttpError(format!("network error: {err}")) }
}

fn parse_last_modified(headers: &header::HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get(header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Sibling path a download is staged at before the final rename.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}
