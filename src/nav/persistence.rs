//! Durable set of expanded node ids.
//!
//! All reads and writes go through a single actor task that owns the set.
//! Updates are queued in the order they are issued and each one is applied
//! and saved before the next is looked at, so two toggles fired back to back
//! can never lose each other's write.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::nav::listing::ExpandedIds;

/// A mutation applied to the expanded-id set inside one transaction.
pub type ExpansionMutator = Box<dyn FnOnce(&mut ExpandedIds) + Send>;

/// Where the expanded-id set is stored between sessions.
#[async_trait]
pub trait ExpansionBackend: Send + Sync + 'static {
    async fn load(&self) -> Result<ExpandedIds>;
    async fn save(&self, ids: &ExpandedIds) -> Result<()>;
}

/// Stores the set as a JSON array of ids.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/navtree/expanded.json`, if the platform has a data directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("navtree").join("expanded.json"))
    }
}

#[async_trait]
impl ExpansionBackend for JsonFileBackend {
    /// A missing file is an empty set.
    async fn load(&self) -> Result<ExpandedIds> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let ids: Vec<String> = serde_json::from_str(&content)?;
                Ok(ids.into_iter().collect())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ExpandedIds::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Written to a sibling temp file first, then renamed over the target.
    async fn save(&self, ids: &ExpandedIds) -> Result<()> {
        let write = async {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&ids.iter().collect::<Vec<_>>())?;
            let tmp = self.path.with_extension("json.tmp");
            tokio::fs::write(&tmp, content).await?;
            tokio::fs::rename(&tmp, &self.path).await?;
            Ok::<(), AppError>(())
        };
        write.await.map_err(|e| {
            AppError::Persistence(format!("{}: {}", self.path.display(), e))
        })
    }
}

/// Keeps the set in memory only.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    ids: Mutex<ExpandedIds>,
    fail_saves: bool,
}

impl MemoryBackend {
    #[cfg(test)]
    pub fn new(initial: ExpandedIds) -> Self {
        Self {
            ids: Mutex::new(initial),
            fail_saves: false,
        }
    }

    /// A backend whose saves always fail, for exercising the error path.
    #[cfg(test)]
    pub fn failing(initial: ExpandedIds) -> Self {
        Self {
            ids: Mutex::new(initial),
            fail_saves: true,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ExpandedIds> {
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ExpansionBackend for MemoryBackend {
    async fn load(&self) -> Result<ExpandedIds> {
        Ok(self.lock().clone())
    }

    async fn save(&self, ids: &ExpandedIds) -> Result<()> {
        if self.fail_saves {
            return Err(AppError::Persistence("storage is read-only".into()));
        }
        *self.lock() = ids.clone();
        Ok(())
    }
}

enum Command {
    Update {
        mutator: ExpansionMutator,
        done: oneshot::Sender<Result<ExpandedIds>>,
    },
    Snapshot(oneshot::Sender<ExpandedIds>),
}

/// Handle to the expanded-id actor. Cloning shares the same actor.
#[derive(Debug, Clone)]
pub struct ExpansionStore {
    tx: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Update { .. } => f.write_str("Update"),
            Command::Snapshot(_) => f.write_str("Snapshot"),
        }
    }
}

impl ExpansionStore {
    /// Load the stored set and start the actor.
    ///
    /// A set that cannot be loaded is logged and replaced by an empty one.
    pub async fn spawn<B: ExpansionBackend>(backend: B) -> Self {
        let ids = match backend.load().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "could not load expansion state, starting empty");
                ExpandedIds::new()
            }
        };
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(backend, ids, rx));
        Self { tx }
    }

    /// The current set, after every update issued before this call.
    pub async fn get_expanded_ids(&self) -> ExpandedIds {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Snapshot(tx)).is_err() {
            return ExpandedIds::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Queue a read-modify-write transaction on the set.
    ///
    /// The update is ordered at the moment of this call. The receiver yields
    /// the resulting set, or the save error; the in-memory set is updated
    /// either way.
    pub fn update_expanded_set<F>(&self, mutator: F) -> oneshot::Receiver<Result<ExpandedIds>>
    where
        F: FnOnce(&mut ExpandedIds) + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        let command = Command::Update {
            mutator: Box::new(mutator),
            done,
        };
        if let Err(mpsc::error::SendError(Command::Update { done, .. })) = self.tx.send(command) {
            let _ = done.send(Err(AppError::Persistence(
                "expansion store has shut down".into(),
            )));
        }
        rx
    }

    /// Record that the user expanded or collapsed `id`.
    pub fn record_toggle(&self, id: &str, expanded: bool) -> oneshot::Receiver<Result<ExpandedIds>> {
        let id = id.to_string();
        self.update_expanded_set(move |ids| {
            if expanded {
                ids.insert(id);
            } else {
                ids.remove(&id);
            }
        })
    }
}

async fn run<B: ExpansionBackend>(
    backend: B,
    mut ids: ExpandedIds,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Snapshot(reply) => {
                let _ = reply.send(ids.clone());
            }
            Command::Update { mutator, done } => {
                let mut next = ids.clone();
                mutator(&mut next);
                if next == ids {
                    let _ = done.send(Ok(ids.clone()));
                    continue;
                }
                ids = next;
                let outcome = match backend.save(&ids).await {
                    Ok(()) => {
                        debug!(count = ids.len(), "saved expansion state");
                        Ok(ids.clone())
                    }
                    Err(e) => {
                        warn!(error = %e, "expansion state kept in memory only");
                        Err(e)
                    }
                };
                let _ = done.send(outcome);
            }
        }
    }
}
