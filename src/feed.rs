//! IP-range → ASN dataset feed.
//!
//! Fetches the ip2asn TSV dataset over HTTP with an on-disk cache for
//! offline fallback, or reads it from a local file when one is configured.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::FeedSettings;

/// Default timeout for HTTP requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// User-Agent header value for HTTP requests.
const USER_AGENT: &str = concat!("harrier/", env!("CARGO_PKG_VERSION"));

/// Cache filename for the fetched dataset.
const CACHE_FILE: &str = "ip2asn.tsv";

/// One record of the dataset: an inclusive address range and its AS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpRange {
    pub first: IpAddr,
    pub last: IpAddr,
    pub asn: u32,
    pub cc: String,
    pub description: String,
}

/// Error type for feed operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// HTTP request failed with a non-success status code.
    #[error("HTTP request failed for {url}: status {status}")]
    HttpStatus { url: String, status: u16 },

    /// Network error during HTTP request.
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Timeout fetching the remote dataset.
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Local dataset file was not found.
    #[error("dataset file not found: {0:?}")]
    NotFound(PathBuf),

    /// Cache not available for fallback.
    #[error("dataset cache not available: {0:?}")]
    CacheUnavailable(PathBuf),

    /// I/O error reading or writing dataset files.
    #[error("dataset I/O error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Task join error from spawning a blocking task.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Failed to create the HTTP client.
    #[error("failed to create HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Fetches the IP-range dataset configured in [`FeedSettings`].
pub struct RangeFeed {
    client: Client,
    url: String,
    path: Option<PathBuf>,
    cache_dir: PathBuf,
}

impl RangeFeed {
    /// Create a feed from its settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(settings: &FeedSettings) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(FeedError::ClientBuild)?;

        Ok(Self {
            client,
            url: settings.url.clone(),
            path: settings.path.clone(),
            cache_dir: settings.cache_dir.clone().unwrap_or_else(default_cache_dir),
        })
    }

    /// Fetch and parse the full dataset.
    ///
    /// Reads the configured local file when one is set; otherwise fetches
    /// over HTTP, saving a copy to the cache directory, and falls back to
    /// the cached copy when the fetch fails. Malformed records are skipped
    /// silently during parsing.
    pub async fn fetch_ip_ranges(&self) -> Result<Vec<IpRange>, FeedError> {
        let content = match &self.path {
            Some(path) => read_file(path).await?,
            None => self.fetch_or_cache().await?,
        };

        // Parse in a blocking task; the combined dataset runs to hundreds
        // of thousands of lines.
        let ranges = tokio::task::spawn_blocking(move || parse_ip2asn(&content)).await?;
        Ok(ranges)
    }

    /// Fetch from the remote URL, falling back to the on-disk cache.
    async fn fetch_or_cache(&self) -> Result<String, FeedError> {
        let cache_path = self.cache_dir.join(CACHE_FILE);

        match self.fetch_remote().await {
            Ok(content) => {
                // Save to cache (best effort, don't fail if cache write fails)
                if let Err(err) = save_cache(&cache_path, &content).await {
                    tracing::warn!(path = ?cache_path, error = ?err, "failed to cache feed data");
                }
                Ok(content)
            }
            Err(err) => {
                tracing::warn!(
                    url = %self.url,
                    error = ?err,
                    "failed to fetch IP range feed, trying cache"
                );
                metrics::counter!(crate::metrics::FEED_FETCH_FAILURES).increment(1);
                load_cache(&cache_path).await
            }
        }
    }

    async fn fetch_remote(&self) -> Result<String, FeedError> {
        let response = self.client.get(&self.url).send().await.map_err(|err| {
            if err.is_timeout() {
                FeedError::Timeout {
                    url: self.url.clone(),
                }
            } else {
                FeedError::Network {
                    url: self.url.clone(),
                    source: err,
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(FeedError::HttpStatus {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(|err| FeedError::Network {
            url: self.url.clone(),
            source: err,
        })
    }
}

async fn read_file(path: &Path) -> Result<String, FeedError> {
    let mut file = File::open(path).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            FeedError::NotFound(path.to_path_buf())
        } else {
            FeedError::Io {
                path: path.to_path_buf(),
                source: err,
            }
        }
    })?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .await
        .map_err(|err| FeedError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;

    Ok(content)
}

async fn save_cache(cache_path: &Path, content: &str) -> Result<(), FeedError> {
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent).await.map_err(|err| FeedError::Io {
            path: parent.to_path_buf(),
            source: err,
        })?;
    }

    let mut file = File::create(cache_path).await.map_err(|err| FeedError::Io {
        path: cache_path.to_path_buf(),
        source: err,
    })?;

    file.write_all(content.as_bytes())
        .await
        .map_err(|err| FeedError::Io {
            path: cache_path.to_path_buf(),
            source: err,
        })?;

    file.flush().await.map_err(|err| FeedError::Io {
        path: cache_path.to_path_buf(),
        source: err,
    })?;

    tracing::debug!(path = ?cache_path, "saved feed data to cache");
    Ok(())
}

async fn load_cache(cache_path: &Path) -> Result<String, FeedError> {
    let mut file = File::open(cache_path).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            FeedError::CacheUnavailable(cache_path.to_path_buf())
        } else {
            FeedError::Io {
                path: cache_path.to_path_buf(),
                source: err,
            }
        }
    })?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .await
        .map_err(|err| FeedError::Io {
            path: cache_path.to_path_buf(),
            source: err,
        })?;

    tracing::info!(path = ?cache_path, "loaded feed data from cache");
    Ok(content)
}

/// Parse ip2asn TSV content: `first_ip\tlast_ip\tasn\tcc\tdescription`.
///
/// Malformed lines and unrouted ranges (ASN 0) are skipped.
pub fn parse_ip2asn(content: &str) -> Vec<IpRange> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let first = fields.next()?.trim().parse::<IpAddr>().ok()?;
            let last = fields.next()?.trim().parse::<IpAddr>().ok()?;
            let asn = fields.next()?.trim().parse::<u32>().ok()?;
            if asn == 0 {
                return None;
            }
            let cc = fields.next().unwrap_or_default().trim().to_string();
            let description = fields.next().unwrap_or_default().trim().to_string();

            Some(IpRange {
                first,
                last,
                asn,
                cc,
                description,
            })
        })
        .collect()
}

/// Returns the default cache directory for feed data.
///
/// Falls back to `./cache` if the platform cache directory cannot be
/// determined.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().map_or_else(|| PathBuf::from("./cache"), |p| p.join("harrier"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAMPLE: &str = "1.2.3.0\t1.2.3.255\t64512\tUS\tEXAMPLE-AS\n\
                          9.9.9.0\t9.9.9.255\t19281\tCH\tQUAD9-AS\n";

    fn feed_for(url: String, cache_dir: &TempDir) -> RangeFeed {
        let settings = FeedSettings {
            url,
            path: None,
            cache_dir: Some(cache_dir.path().to_path_buf()),
        };
        RangeFeed::new(&settings).unwrap()
    }

    #[test]
    fn test_parse_ip2asn() {
        let ranges = parse_ip2asn(SAMPLE);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].asn, 64512);
        assert_eq!(ranges[0].cc, "US");
        assert_eq!(ranges[0].first.to_string(), "1.2.3.0");
        assert_eq!(ranges[0].last.to_string(), "1.2.3.255");
        assert_eq!(ranges[1].description, "QUAD9-AS");
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let content = "garbage line\n\
                       1.2.3.0\t1.2.3.255\t64512\tUS\tEXAMPLE-AS\n\
                       1.2.4.0\tnot-an-ip\t64513\tUS\tBAD\n\
                       \n";
        let ranges = parse_ip2asn(content);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].asn, 64512);
    }

    #[test]
    fn test_parse_skips_unrouted_ranges() {
        let content = "1.2.3.0\t1.2.3.255\t0\tNone\tNot routed\n";
        assert!(parse_ip2asn(content).is_empty());
    }

    #[tokio::test]
    async fn should_fetch_ranges_from_url() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ip2asn.tsv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let feed = feed_for(format!("{}/ip2asn.tsv", mock_server.uri()), &temp);

        let ranges = feed.fetch_ip_ranges().await.unwrap();
        assert_eq!(ranges.len(), 2);

        // Verify the cache copy was written
        let cached = std::fs::read_to_string(temp.path().join(CACHE_FILE)).unwrap();
        assert_eq!(cached, SAMPLE);
    }

    #[tokio::test]
    async fn should_fallback_to_cache_when_remote_fails() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ip2asn.tsv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE))
            .expect(1)
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let feed = feed_for(format!("{}/ip2asn.tsv", mock_server.uri()), &temp);

        // First fetch populates the cache
        assert_eq!(feed.fetch_ip_ranges().await.unwrap().len(), 2);

        mock_server.reset().await;
        Mock::given(method("GET"))
            .and(path("/ip2asn.tsv"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        // Second fetch falls back to the cached copy
        assert_eq!(feed.fetch_ip_ranges().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_fail_when_remote_fails_and_no_cache() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ip2asn.tsv"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let feed = feed_for(format!("{}/ip2asn.tsv", mock_server.uri()), &temp);

        let result = feed.fetch_ip_ranges().await;
        assert!(matches!(result, Err(FeedError::CacheUnavailable(_))));
    }

    #[tokio::test]
    async fn should_read_local_file_when_configured() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("ranges.tsv");
        std::fs::write(&file_path, SAMPLE).unwrap();

        let settings = FeedSettings {
            url: "http://127.0.0.1:1/unused".to_string(),
            path: Some(file_path),
            cache_dir: Some(temp.path().to_path_buf()),
        };
        let feed = RangeFeed::new(&settings).unwrap();

        let ranges = feed.fetch_ip_ranges().await.unwrap();
        assert_eq!(ranges.len(), 2);
    }

    #[tokio::test]
    async fn should_report_missing_local_file() {
        let temp = TempDir::new().unwrap();
        let settings = FeedSettings {
            url: "http://127.0.0.1:1/unused".to_string(),
            path: Some(temp.path().join("missing.tsv")),
            cache_dir: Some(temp.path().to_path_buf()),
        };
        let feed = RangeFeed::new(&settings).unwrap();

        let result = feed.fetch_ip_ranges().await;
        assert!(matches!(result, Err(FeedError::NotFound(_))));
    }
}
