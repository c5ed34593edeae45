//! The graph wrapper bound to a storage backend, and backend list
//! construction from configuration.

use crate::config::{Config, DatabaseConfig, GraphKind};
use crate::net::AsnCache;

use super::store::{GraphStore, StoreError, open_store};

/// Filename of the local default database inside the output directory.
const LOCAL_DB_FILE: &str = "harrier.sqlite";

/// A graph database bound to a live storage backend.
pub struct Graph {
    store: Box<dyn GraphStore>,
}

impl Graph {
    pub fn new(store: Box<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Seed the graph with every record currently in the ASN cache.
    ///
    /// Returns the number of records written. Callers treat failures as
    /// best-effort: prior knowledge improves results but is never required
    /// for the system to run.
    pub fn seed_from_cache(&self, cache: &AsnCache) -> Result<usize, StoreError> {
        let records = cache.records();
        for record in &records {
            self.store.upsert_netblock(record)?;
        }
        Ok(records.len())
    }

    /// Number of netblocks currently stored.
    pub fn netblock_count(&self) -> Result<usize, StoreError> {
        self.store.netblock_count()
    }

    /// Human-readable description of the backing store.
    pub fn describe(&self) -> String {
        self.store.describe()
    }

    /// Release the backing store. Idempotent.
    pub fn close(&self) {
        self.store.close();
    }
}

/// Open every configured graph database, the local default first.
///
/// A local default sqlite database is prepended when an output directory is
/// configured. Any backend failing to open is fatal: already-opened graphs
/// are closed and the error is returned. Each opened graph is seeded from
/// the ASN cache on a best-effort basis.
pub fn open_graphs(cfg: &Config, cache: &AsnCache) -> Result<Vec<Graph>, StoreError> {
    let mut dbs = Vec::new();
    if let Some(dir) = &cfg.output_directory {
        dbs.push(DatabaseConfig {
            kind: GraphKind::Sqlite,
            path: Some(dir.join(LOCAL_DB_FILE)),
            options: None,
        });
    }
    dbs.extend(cfg.graph_databases.iter().cloned());

    let mut graphs: Vec<Graph> = Vec::new();
    for db in &dbs {
        let store = match open_store(db) {
            Ok(store) => store,
            Err(err) => {
                for graph in &graphs {
                    graph.close();
                }
                return Err(err);
            }
        };

        let graph = Graph::new(store);
        match graph.seed_from_cache(cache) {
            Ok(count) => {
                tracing::info!(graph = %graph.describe(), records = count, "seeded graph from ASN cache");
            }
            Err(err) => {
                tracing::warn!(graph = %graph.describe(), error = %err, "failed to seed graph from ASN cache");
            }
        }

        graphs.push(graph);
    }

    Ok(graphs)
}
