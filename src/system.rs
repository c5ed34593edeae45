//! The system orchestrator: builds, exposes, and tears down the resolver
//! pool, ASN cache, graph backends, and data-source registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::dns::{EdnsProbe, Resolve, ResolverPool, UdpResolver, public_pool, trusted_pool};
use crate::error::{Error, Result};
use crate::feed::{IpRange, RangeFeed};
use crate::graph::{Graph, open_graphs};
use crate::limits;
use crate::net::{AsnCache, AsnRecord, range_to_cidr};
use crate::source::{DataSource, RegistryHandle};

/// The root object wiring every subsystem together.
///
/// Construction is fail-fast: each step releases whatever the previous
/// steps built before returning its error. The registry actor is spawned
/// last, after the final fallible step, so teardown never messages an
/// actor that is not running.
pub struct System {
    cfg: Config,
    pool: Arc<ResolverPool<UdpResolver>>,
    graphs: Vec<Graph>,
    cache: Arc<AsnCache>,
    registry: RegistryHandle,
    stopped: AtomicBool,
}

impl System {
    /// Build a system from configuration.
    pub async fn build(cfg: Config) -> Result<Self> {
        cfg.check_settings()?;

        let max = (limits::soft_file_limit() as f64 * 0.7) as usize;

        let pool = if cfg.trusted_resolvers.is_empty() {
            public_pool(&EdnsProbe::default(), &cfg, max).await
        } else {
            trusted_pool(&cfg, max)
        };
        let pool = pool.ok_or(Error::EmptyResolverPool)?;

        let cache = Arc::new(AsnCache::new());
        if let Err(err) = load_cache(&cfg, &cache).await {
            pool.stop();
            return Err(err);
        }

        ensure_output_directory(&cfg);

        let graphs = match open_graphs(&cfg, &cache) {
            Ok(graphs) => graphs,
            Err(err) => {
                pool.stop();
                return Err(err.into());
            }
        };

        let registry = RegistryHandle::spawn();

        Ok(Self {
            cfg,
            pool,
            graphs,
            cache,
            registry,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The composed resolver pool.
    pub fn pool(&self) -> &Arc<ResolverPool<UdpResolver>> {
        &self.pool
    }

    /// The shared ASN cache.
    pub fn cache(&self) -> &Arc<AsnCache> {
        &self.cache
    }

    /// The opened graph backends.
    pub fn graphs(&self) -> &[Graph] {
        &self.graphs
    }

    /// Register a data source without starting it.
    pub async fn add_source(&self, source: Arc<dyn DataSource>) -> Result<()> {
        self.registry.add(source).await?;
        Ok(())
    }

    /// Start a data source and register it only on clean start.
    pub async fn add_and_start(&self, source: Arc<dyn DataSource>) -> Result<()> {
        self.registry.add_and_start(source).await?;
        Ok(())
    }

    /// Snapshot of registered sources, sorted by name.
    pub async fn data_sources(&self) -> Vec<Arc<dyn DataSource>> {
        self.registry.sources().await
    }

    /// Names of all registered sources, sorted.
    pub async fn source_names(&self) -> Vec<String> {
        self.data_sources()
            .await
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Bulk-start sources, registering the ones that start cleanly within
    /// the deadline. Best-effort; see [`RegistryHandle::set_sources`].
    pub async fn set_data_sources(&self, sources: Vec<Arc<dyn DataSource>>) {
        self.registry.set_sources(sources).await;
    }

    /// Tear everything down. Idempotent: the first call stops every
    /// registered source, terminates the registry actor, closes every
    /// graph, and stops the resolver pool; later calls return `Ok`
    /// immediately. Stop errors are discarded so teardown always runs to
    /// completion.
    pub async fn shutdown(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        for source in self.data_sources().await {
            let _ = source.stop().await;
        }
        self.registry.shutdown().await;

        for graph in &self.graphs {
            graph.close();
        }

        self.pool.stop();

        tracing::info!("system shutdown complete");
        Ok(())
    }

    /// Resident memory of this process in bytes. Diagnostic only.
    pub fn memory_usage(&self) -> u64 {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return 0;
        };
        let mut sys = sysinfo::System::new();
        sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
        sys.process(pid).map_or(0, |p| p.memory())
    }
}

/// Fetch the IP-range dataset and bulk-load it into the cache.
///
/// Fetch failure is fatal; individual records that cannot be expressed as
/// a CIDR, or whose derived mask length is zero, are silently skipped.
async fn load_cache(cfg: &Config, cache: &AsnCache) -> Result<()> {
    let feed = RangeFeed::new(&cfg.feed)?;
    let ranges = feed.fetch_ip_ranges().await?;

    let loaded = fill_cache(cache, &ranges);
    metrics::counter!(crate::metrics::ASN_RECORDS_LOADED).increment(loaded as u64);
    tracing::info!(loaded, fetched = ranges.len(), "loaded ASN cache");
    Ok(())
}

fn fill_cache(cache: &AsnCache, ranges: &[IpRange]) -> usize {
    let mut loaded = 0;
    for range in ranges {
        let Some(cidr) = range_to_cidr(range.first, range.last) else {
            continue;
        };
        if cidr.prefix_len() == 0 {
            continue;
        }

        cache.update(AsnRecord {
            address: range.first,
            asn: range.asn,
            cc: range.cc.clone(),
            prefix: cidr,
            description: range.description.clone(),
        });
        loaded += 1;
    }
    loaded
}

/// Create the configured output directory. Failure is logged and swallowed:
/// downstream consumers surface their own errors if the directory really is
/// unusable.
fn ensure_output_directory(cfg: &Config) {
    let Some(dir) = &cfg.output_directory else {
        return;
    };

    if let Err(err) = std::fs::create_dir_all(dir) {
        tracing::warn!(path = ?dir, error = %err, "failed to create output directory");
    }
}
