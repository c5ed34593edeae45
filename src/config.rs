//! Configuration loading and validation.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Queries per second granted to each baseline (presumed reliable) resolver.
pub const DEFAULT_QUERIES_PER_BASELINE_RESOLVER: usize = 50;

/// Queries per second granted to each probed public resolver.
pub const DEFAULT_QUERIES_PER_PUBLIC_RESOLVER: usize = 10;

/// Small, fixed list of well-known resolvers used as the fallback tier.
///
/// These are assumed reachable; the baseline pool built from them must
/// always compose successfully.
pub const DEFAULT_BASELINE_RESOLVERS: &[&str] = &[
    "8.8.8.8",         // Google
    "8.8.4.4",         // Google secondary
    "1.1.1.1",         // Cloudflare
    "1.0.0.1",         // Cloudflare secondary
    "9.9.9.9",         // Quad9
    "149.112.112.112", // Quad9 secondary
    "84.200.69.80",    // DNS.WATCH
    "64.6.64.6",       // Verisign
];

/// Larger set of public resolver candidates validated by probing before use.
pub const PUBLIC_RESOLVERS: &[&str] = &[
    "209.244.0.3",    // Level3
    "209.244.0.4",    // Level3 secondary
    "64.6.65.6",      // Verisign secondary
    "77.88.8.8",      // Yandex.DNS
    "77.88.8.1",      // Yandex.DNS secondary
    "74.82.42.42",    // Hurricane Electric
    "8.26.56.26",     // Comodo
    "8.20.247.20",    // Comodo secondary
    "195.46.39.39",   // SafeDNS
    "195.46.39.40",   // SafeDNS secondary
    "216.146.35.35",  // Dyn
    "216.146.36.36",  // Dyn secondary
    "37.235.1.174",   // FreeDNS
    "37.235.1.177",   // FreeDNS secondary
    "156.154.70.1",   // Neustar
    "156.154.71.1",   // Neustar secondary
    "91.239.100.100", // UncensoredDNS
    "89.233.43.71",   // UncensoredDNS secondary
];

/// Main configuration for the harrier system.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Explicitly trusted resolver addresses ("1.2.3.4" or "1.2.3.4:53").
    /// When set, the public candidate list is not probed at all.
    #[serde(default)]
    pub trusted_resolvers: Vec<String>,

    /// Target total DNS queries per second across the whole pool.
    /// When unset, a budget is derived from the resolver count.
    pub max_dns_queries: Option<usize>,

    /// Directory for local findings. Created best-effort at startup; when
    /// set, a local default graph database is placed inside it.
    pub output_directory: Option<PathBuf>,

    /// Additional graph databases to open alongside the local default.
    #[serde(default)]
    pub graph_databases: Vec<DatabaseConfig>,

    /// IP-range → ASN dataset source.
    #[serde(default)]
    pub feed: FeedSettings,

    /// Prometheus metrics exporter.
    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// Supported graph storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphKind {
    Sqlite,
    Memory,
}

/// A single graph database entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Storage backend kind.
    pub kind: GraphKind,

    /// Database file path. Required for `sqlite`, ignored for `memory`.
    pub path: Option<PathBuf>,

    /// Backend-specific options, passed through opaquely.
    pub options: Option<String>,
}

/// Where the IP-range → ASN dataset comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedSettings {
    /// HTTP source for the ip2asn TSV dataset.
    #[serde(default = "default_feed_url")]
    pub url: String,

    /// Local TSV file used instead of the HTTP source when set.
    pub path: Option<PathBuf>,

    /// Directory for the on-disk fallback copy of the fetched dataset.
    /// Defaults to the platform cache directory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            path: None,
            cache_dir: None,
        }
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSettings {
    /// Enable the metrics HTTP listener.
    #[serde(default)]
    pub enabled: bool,

    /// Address the exporter listens on.
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

fn default_feed_url() -> String {
    "https://iptoasn.com/data/ip2asn-combined.tsv".to_string()
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.check_settings()?;
        Ok(config)
    }

    /// Validate the configuration. Called on parse and again before
    /// system construction; it has no side effects.
    pub fn check_settings(&self) -> Result<()> {
        for addr in &self.trusted_resolvers {
            if parse_resolver_addr(addr).is_none() {
                return Err(
                    ConfigError::Validation(format!("invalid resolver address: {addr}")).into(),
                );
            }
        }

        if self.max_dns_queries == Some(0) {
            return Err(ConfigError::Validation("max_dns_queries must be > 0".into()).into());
        }

        for db in &self.graph_databases {
            if db.kind == GraphKind::Sqlite && db.path.is_none() {
                return Err(ConfigError::Validation(
                    "sqlite graph database requires a path".into(),
                )
                .into());
            }
        }

        Ok(())
    }
}

/// Parse a resolver address, defaulting the port to 53 when absent.
pub fn parse_resolver_addr(addr: &str) -> Option<SocketAddr> {
    if let Ok(sa) = addr.parse::<SocketAddr>() {
        return Some(sa);
    }
    addr.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, 53))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
            trusted_resolvers = ["8.8.8.8", "1.1.1.1:5353"]
            max_dns_queries = 200
            output_directory = "/tmp/harrier"

            [[graph_databases]]
            kind = "memory"
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.trusted_resolvers.len(), 2);
        assert_eq!(config.max_dns_queries, Some(200));
        assert_eq!(config.graph_databases.len(), 1);
        assert_eq!(config.graph_databases[0].kind, GraphKind::Memory);
    }

    #[test]
    fn test_default_values() {
        let config = Config::parse("").unwrap();
        assert!(config.trusted_resolvers.is_empty());
        assert!(config.max_dns_queries.is_none());
        assert!(config.output_directory.is_none());
        assert!(config.graph_databases.is_empty());
        assert_eq!(config.feed.url, default_feed_url());
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_feed_settings() {
        let toml = r#"
            [feed]
            url = "http://127.0.0.1:8080/ip2asn.tsv"
            cache_dir = "/tmp/harrier-cache"
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.feed.url, "http://127.0.0.1:8080/ip2asn.tsv");
        assert_eq!(
            config.feed.cache_dir.as_deref(),
            Some(Path::new("/tmp/harrier-cache"))
        );
        assert!(config.feed.path.is_none());
    }

    #[test]
    fn test_invalid_resolver_address_rejected() {
        let toml = r#"
            trusted_resolvers = ["not-an-address"]
        "#;

        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_zero_query_budget_rejected() {
        let toml = r#"
            max_dns_queries = 0
        "#;

        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_sqlite_without_path_rejected() {
        let toml = r#"
            [[graph_databases]]
            kind = "sqlite"
        "#;

        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
            unknown_field = "value"
        "#;

        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_parse_resolver_addr_defaults_port() {
        assert_eq!(
            parse_resolver_addr("9.9.9.9"),
            Some(SocketAddr::from(([9, 9, 9, 9], 53)))
        );
        assert_eq!(
            parse_resolver_addr("9.9.9.9:5353"),
            Some(SocketAddr::from(([9, 9, 9, 9], 5353)))
        );
        assert!(parse_resolver_addr("bogus").is_none());
    }

    #[test]
    fn test_baseline_resolvers_parse() {
        for addr in DEFAULT_BASELINE_RESOLVERS {
            assert!(parse_resolver_addr(addr).is_some(), "bad address: {addr}");
        }
        for addr in PUBLIC_RESOLVERS {
            assert!(parse_resolver_addr(addr).is_some(), "bad address: {addr}");
        }
    }
}
