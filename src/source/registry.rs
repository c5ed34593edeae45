//! The data-source registry actor.
//!
//! A single task owns the canonical service list; every read and write is
//! message-passed to it, so access is serialized in arrival order without
//! any lock. No other component may touch the list directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::{DataSource, SourceError};

/// Mailbox capacity for the registry actor.
const REGISTRY_CHAN_CAP: usize = 16;

/// How long a bulk start waits for start/register confirmations before
/// returning. Stragglers keep running and may register afterward.
pub const BULK_START_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The actor has shut down and accepts no further requests.
    #[error("data source registry is not running")]
    Closed,

    #[error(transparent)]
    Start(#[from] SourceError),
}

enum RegistryRequest {
    Add {
        source: Arc<dyn DataSource>,
        ack: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Arc<dyn DataSource>>>,
    },
    Shutdown,
}

/// Handle to the registry actor. Cheap to clone; all clones address the
/// same actor.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryRequest>,
}

impl RegistryHandle {
    /// Spawn the actor task and return a handle to it.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(REGISTRY_CHAN_CAP);
        tokio::spawn(run(rx));
        Self { tx }
    }

    /// Register a source. Blocks until the actor has appended it and
    /// re-sorted the list.
    pub async fn add(&self, source: Arc<dyn DataSource>) -> Result<(), RegistryError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(RegistryRequest::Add { source, ack })
            .await
            .map_err(|_| RegistryError::Closed)?;
        done.await.map_err(|_| RegistryError::Closed)
    }

    /// Start a source and register it only if the start succeeded.
    pub async fn add_and_start(&self, source: Arc<dyn DataSource>) -> Result<(), RegistryError> {
        source.start().await?;
        self.add(source).await
    }

    /// Snapshot of the current list, sorted by name. Returns an empty list
    /// once the actor has shut down.
    pub async fn sources(&self) -> Vec<Arc<dyn DataSource>> {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(RegistryRequest::Snapshot { reply })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Start every given source concurrently and register the ones that
    /// start cleanly.
    ///
    /// Waits up to [`BULK_START_TIMEOUT`] for confirmations; sources still
    /// starting at the deadline are left running and may register
    /// asynchronously later. Individual failures are not surfaced.
    pub async fn set_sources(&self, sources: Vec<Arc<dyn DataSource>>) {
        if sources.is_empty() {
            return;
        }

        let (tx, mut rx) = mpsc::channel(sources.len());
        let expected = sources.len();

        for source in sources {
            let handle = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = handle.add_and_start(source).await;
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let deadline = tokio::time::sleep(BULK_START_TIMEOUT);
        tokio::pin!(deadline);

        for _ in 0..expected {
            tokio::select! {
                () = &mut deadline => break,
                outcome = rx.recv() => match outcome {
                    Some(Ok(())) => {
                        metrics::counter!(crate::metrics::SOURCES_REGISTERED).increment(1);
                    }
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "data source failed to start");
                    }
                    None => break,
                },
            }
        }
    }

    /// Terminate the actor loop. Requests already in the mailbox ahead of
    /// this one are still served.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(RegistryRequest::Shutdown).await;
    }
}

async fn run(mut rx: mpsc::Receiver<RegistryRequest>) {
    let mut sources: Vec<Arc<dyn DataSource>> = Vec::new();

    while let Some(request) = rx.recv().await {
        match request {
            RegistryRequest::Add { source, ack } => {
                sources.push(source);
                // Stable sort keeps duplicate names adjacent in insertion
                // order; duplicates are permitted.
                sources.sort_by(|a, b| a.name().cmp(b.name()));
                let _ = ack.send(());
            }
            RegistryRequest::Snapshot { reply } => {
                let _ = reply.send(sources.clone());
            }
            RegistryRequest::Shutdown => return,
        }
    }
}
