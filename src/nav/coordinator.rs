//! Expand/collapse handling: fetches children through the adapters and
//! writes completed listings back into the tree.
//!
//! Fetches run as spawned tasks and report back over a channel. The event
//! loop owns the tree and feeds each [`ListingCompletion`] to
//! [`ExpansionCoordinator::apply`], so completions land in the order they
//! finish and the tree has exactly one writer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::nav::collaborators::Notifier;
use crate::nav::listing::{build_children, source_nodes, ExpandedIds, Listing};
use crate::nav::model::{TreeModel, TreeNode};
use crate::nav::node::{NodeData, NodeId, NodeKind, LOCAL_SOURCE_ID};
use crate::nav::persistence::ExpansionStore;
use crate::sources::{LocalSource, PlatformSource};

/// The navigation tree as the engine uses it.
pub type NavTree = TreeModel<NodeData>;

/// Default bound on a single listing call.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The adapters the coordinator lists through.
#[derive(Clone)]
pub struct DataSources {
    pub local: Arc<dyn LocalSource>,
    pub platform: Arc<dyn PlatformSource>,
}

impl DataSources {
    pub fn new(local: Arc<dyn LocalSource>, platform: Arc<dyn PlatformSource>) -> Self {
        Self { local, platform }
    }
}

/// Result of one listing fetch, addressed to the node that asked for it.
#[derive(Debug)]
pub struct ListingCompletion {
    pub node_id: NodeId,
    pub outcome: Result<Listing>,
}

/// What [`ExpansionCoordinator::apply`] did with a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Children were written; `restored` of them were re-expanded from the snapshot.
    Applied { restored: usize },
    /// The node was collapsed before the listing arrived.
    Stale,
    Failed,
    /// The node is no longer in the tree.
    Vanished,
}

/// The single adapter call that lists a node's children.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ListingRequest {
    LocalRoot,
    Folder(String),
    Projects(String),
    Apps {
        source_id: String,
        owner: String,
        slug: String,
    },
}

impl ListingRequest {
    fn for_node(node: &TreeNode<NodeData>) -> Option<Self> {
        match (node.kind, &node.data) {
            (NodeKind::Source, _) if node.id() == LOCAL_SOURCE_ID => Some(Self::LocalRoot),
            (NodeKind::Source, _) => Some(Self::Projects(node.id().to_string())),
            (NodeKind::Project, NodeData::Project { source_id, project }) => Some(Self::Apps {
                source_id: source_id.clone(),
                owner: project.owner.clone(),
                slug: project.slug.clone(),
            }),
            (NodeKind::Folder, NodeData::Entry(entry)) => Some(Self::Folder(entry.path.clone())),
            (NodeKind::Folder, _) => Some(Self::Folder(node.id().to_string())),
            (NodeKind::Project, _) | (NodeKind::File, _) | (NodeKind::App, _) => None,
        }
    }

    async fn fetch(self, sources: &DataSources) -> Result<Listing> {
        match self {
            Self::LocalRoot => Ok(Listing::LocalRoot(sources.local.list_local_root().await?)),
            Self::Folder(path) => Ok(Listing::Folder(
                sources.local.list_local_folder(&path).await?,
            )),
            Self::Projects(source_id) => {
                let projects = sources.platform.list_platform_projects(&source_id).await?;
                Ok(Listing::Projects {
                    source_id,
                    projects,
                })
            }
            Self::Apps {
                source_id,
                owner,
                slug,
            } => Ok(Listing::Apps(
                sources
                    .platform
                    .list_project_apps(&source_id, &owner, &slug)
                    .await?,
            )),
        }
    }
}

/// Translates expand/collapse intents into fetches and tree updates.
pub struct ExpansionCoordinator {
    sources: DataSources,
    store: ExpansionStore,
    snapshot: ExpandedIds,
    notifier: Arc<dyn Notifier>,
    completions: mpsc::UnboundedSender<ListingCompletion>,
    fetch_timeout: Duration,
    local_label: String,
}

impl ExpansionCoordinator {
    /// Start a navigation session. The expanded-id snapshot is read once here.
    pub async fn new(
        sources: DataSources,
        store: ExpansionStore,
        notifier: Arc<dyn Notifier>,
        completions: mpsc::UnboundedSender<ListingCompletion>,
    ) -> Self {
        let snapshot = store.get_expanded_ids().await;
        debug!(expanded = snapshot.len(), "expansion snapshot taken");
        Self {
            sources,
            store,
            snapshot,
            notifier,
            completions,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            local_label: "Local Files".to_string(),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_local_label(mut self, label: impl Into<String>) -> Self {
        self.local_label = label.into();
        self
    }

    /// Build the root forest and start fetching any roots that were left expanded.
    ///
    /// A failing platform listing is reported; the local source is always present.
    pub async fn load_sources(&self, tree: &mut NavTree) {
        let millis = self.fetch_timeout.as_millis() as u64;
        let listed = tokio::time::timeout(
            self.fetch_timeout,
            self.sources.platform.list_platform_sources(),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AppError::Timeout {
                operation: "listing platform sources".into(),
                millis,
            })
        });

        let sources = match listed {
            Ok(sources) => sources,
            Err(e) => {
                warn!(error = %e, "platform sources unavailable");
                self.notifier.notify_failure(&e);
                Vec::new()
            }
        };
        info!(platform_sources = sources.len(), "initializing navigation tree");
        tree.initialize(source_nodes(&self.local_label, sources, &self.snapshot));

        let expanded_roots: Vec<NodeId> = tree
            .roots()
            .filter(|root| root.is_expanded)
            .map(|root| root.id().to_string())
            .collect();
        for id in expanded_roots {
            self.request_children(tree, &id);
        }
    }

    /// Handle a user toggle. Returns whether a fetch was dispatched.
    pub fn toggle(&self, tree: &mut NavTree, id: &str, expanded: bool) -> bool {
        let Some(node) = tree.find(id) else {
            debug!(id, "toggle for unknown node");
            return false;
        };
        if !node.is_expandable {
            return false;
        }
        let was_loading = node.loading;

        let _ = self.store.record_toggle(id, expanded);

        if !expanded {
            tree.modify(id, |n| n.is_expanded = false);
            return false;
        }

        tree.modify(id, |n| {
            n.is_expanded = true;
            n.error = None;
        });
        if was_loading {
            debug!(id, "already loading, ignoring duplicate expand");
            return false;
        }
        self.request_children(tree, id)
    }

    /// Mark the node loading and dispatch its listing call.
    ///
    /// Returns `false` if the node is unknown, already loading, or has no listing.
    pub fn request_children(&self, tree: &mut NavTree, id: &str) -> bool {
        let Some(node) = tree.find(id) else {
            return false;
        };
        if node.loading {
            return false;
        }
        let Some(request) = ListingRequest::for_node(node) else {
            return false;
        };
        tree.modify(id, |n| n.loading = true);
        debug!(id, ?request, "dispatching listing");

        let sources = self.sources.clone();
        let completions = self.completions.clone();
        let timeout = self.fetch_timeout;
        let node_id = id.to_string();
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, request.fetch(&sources)).await {
                Ok(Ok(listing)) => Ok(listing),
                Ok(Err(e)) => Err(AppError::Fetch {
                    node: node_id.clone(),
                    message: e.to_string(),
                }),
                Err(_) => Err(AppError::Timeout {
                    operation: format!("listing {}", node_id),
                    millis: timeout.as_millis() as u64,
                }),
            };
            let _ = completions.send(ListingCompletion { node_id, outcome });
        });
        true
    }

    /// Write a completed listing into the tree.
    pub fn apply(&self, tree: &mut NavTree, completion: ListingCompletion) -> ApplyOutcome {
        let ListingCompletion { node_id, outcome } = completion;
        let Some(node) = tree.find(&node_id) else {
            debug!(id = %node_id, "listing for node no longer in tree");
            return ApplyOutcome::Vanished;
        };

        match outcome {
            Ok(_) if !node.is_expanded => {
                debug!(id = %node_id, "collapsed while loading, dropping listing");
                tree.modify(&node_id, |n| n.loading = false);
                ApplyOutcome::Stale
            }
            Ok(listing) => {
                let count = listing.entry_count();
                let children = build_children(&node_id, listing, &self.snapshot);
                let restore: Vec<NodeId> = children
                    .iter()
                    .filter(|c| c.is_expanded)
                    .map(|c| c.id().to_string())
                    .collect();
                tree.replace_children(&node_id, children, |n| {
                    n.loading = false;
                    n.error = None;
                });
                debug!(id = %node_id, count, "listing applied");

                let restored = restore
                    .iter()
                    .filter(|id| self.request_children(tree, id))
                    .count();
                ApplyOutcome::Applied { restored }
            }
            Err(e) => {
                warn!(id = %node_id, error = %e, "listing failed");
                let message = e.to_string();
                tree.modify(&node_id, |n| {
                    n.loading = false;
                    n.is_expanded = false;
                    n.error = Some(message);
                });
                self.notifier.notify_failure(&e);
                ApplyOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::nav::persistence::MemoryBackend;
    use crate::sources::catalog::CatalogPlatform;
    use crate::sources::testing::{RecordingNotifier, StaticLocal, UnreachablePlatform};
    use crate::sources::FilesystemEntry;

    const CATALOG: &str = r#"{ "sources": [
        { "id": "sbg", "label": "Seven Bridges", "projects": [
            { "name": "Demo", "owner": "A", "slug": "demo",
              "apps": [ { "id": "bwa", "label": "BWA", "class": "CommandLineTool" } ] },
            { "name": "Demo", "owner": "B", "slug": "demo" } ] } ] }"#;

    struct Harness {
        tree: NavTree,
        coordinator: ExpansionCoordinator,
        rx: mpsc::UnboundedReceiver<ListingCompletion>,
        notifier: Arc<RecordingNotifier>,
        local: Arc<StaticLocal>,
        store: ExpansionStore,
    }

    impl Harness {
        async fn new(local: StaticLocal, platform: Arc<dyn PlatformSource>, expanded: &[&str]) -> Self {
            let local = Arc::new(local);
            let notifier = Arc::new(RecordingNotifier::default());
            let store = ExpansionStore::spawn(MemoryBackend::new(
                expanded.iter().map(|s| s.to_string()).collect(),
            ))
            .await;
            let (tx, rx) = mpsc::unbounded_channel();
            let coordinator = ExpansionCoordinator::new(
                DataSources::new(local.clone(), platform),
                store.clone(),
                notifier.clone(),
                tx,
            )
            .await;
            let mut tree = NavTree::new();
            coordinator.load_sources(&mut tree).await;
            Self {
                tree,
                coordinator,
                rx,
                notifier,
                local,
                store,
            }
        }

        async fn local(local: StaticLocal) -> Self {
            Self::new(local, Arc::new(CatalogPlatform::default()), &[]).await
        }

        async fn next(&mut self) -> ApplyOutcome {
            let completion = self.rx.recv().await.unwrap();
            self.coordinator.apply(&mut self.tree, completion)
        }

        fn toggle(&mut self, id: &str, expanded: bool) -> bool {
            self.coordinator.toggle(&mut self.tree, id, expanded)
        }

        fn visible(&self) -> Vec<String> {
            self.tree.visible_rows().into_iter().map(|r| r.id).collect()
        }
    }

    fn workspace() -> StaticLocal {
        StaticLocal::with_roots(&["/w"]).folder(
            "/w",
            vec![
                FilesystemEntry::directory("/w/sub"),
                FilesystemEntry::file("/w/a.cwl", None),
            ],
        )
    }

    #[tokio::test]
    async fn expanding_local_source_lists_roots() {
        let mut h = Harness::local(workspace()).await;
        assert!(h.toggle(LOCAL_SOURCE_ID, true));
        assert!(h.tree.find(LOCAL_SOURCE_ID).unwrap().loading);

        assert_eq!(h.next().await, ApplyOutcome::Applied { restored: 0 });
        let local = h.tree.find(LOCAL_SOURCE_ID).unwrap();
        assert!(!local.loading);
        assert!(local.is_expanded);
        assert_eq!(h.visible(), vec!["local", "/w"]);
    }

    #[tokio::test]
    async fn collapse_before_completion_drops_listing() {
        let mut h = Harness::local(workspace()).await;
        h.toggle(LOCAL_SOURCE_ID, true);
        h.next().await;

        assert!(h.toggle("/w", true));
        h.toggle("/w", false);
        assert_eq!(h.next().await, ApplyOutcome::Stale);

        let node = h.tree.find("/w").unwrap();
        assert!(node.children().is_none());
        assert!(!node.is_expanded);
        assert!(!node.loading);
    }

    #[tokio::test]
    async fn duplicate_expand_while_loading_is_ignored() {
        let mut h = Harness::local(workspace()).await;
        assert!(h.toggle(LOCAL_SOURCE_ID, true));
        assert!(!h.toggle(LOCAL_SOURCE_ID, true));
        h.next().await;
        assert_eq!(h.local.calls(), vec!["<root>".to_string()]);
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reexpand_while_loading_applies_late_listing() {
        let mut h = Harness::local(workspace()).await;
        h.toggle(LOCAL_SOURCE_ID, true);
        h.toggle(LOCAL_SOURCE_ID, false);
        assert!(!h.toggle(LOCAL_SOURCE_ID, true));
        assert_eq!(h.next().await, ApplyOutcome::Applied { restored: 0 });
        assert_eq!(h.visible(), vec!["local", "/w"]);
    }

    #[tokio::test]
    async fn failure_keeps_children_and_notifies() {
        let mut h = Harness::local(workspace()).await;
        h.toggle(LOCAL_SOURCE_ID, true);
        h.next().await;
        h.toggle("/w", true);
        h.next().await;
        assert_eq!(h.tree.children_of("/w").len(), 2);

        h.toggle("/w", false);
        h.toggle("/w", true);
        let failed = ListingCompletion {
            node_id: "/w".into(),
            outcome: Err(AppError::Fetch {
                node: "/w".into(),
                message: "permission denied".into(),
            }),
        };
        assert_eq!(h.coordinator.apply(&mut h.tree, failed), ApplyOutcome::Failed);

        let node = h.tree.find("/w").unwrap();
        assert!(!node.loading);
        assert!(!node.is_expanded);
        assert!(node.error.as_deref().unwrap().contains("permission denied"));
        assert_eq!(h.tree.children_of("/w").len(), 2);
        assert_eq!(h.notifier.failures().len(), 1);

        // the real listing for the retried expand arrives after the failure
        assert_eq!(h.next().await, ApplyOutcome::Stale);
        assert_eq!(h.tree.children_of("/w").len(), 2);
    }

    #[tokio::test]
    async fn adapter_error_becomes_fetch_failure() {
        let mut h = Harness::local(workspace().failing("/w")).await;
        h.toggle(LOCAL_SOURCE_ID, true);
        h.next().await;
        h.toggle("/w", true);
        assert_eq!(h.next().await, ApplyOutcome::Failed);

        let failures = h.notifier.failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("Could not list /w"));

        // re-toggling retries and clears the error flag
        assert!(h.toggle("/w", true));
        assert!(h.tree.find("/w").unwrap().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_listing_times_out() {
        let local = workspace().delayed(Duration::from_secs(60));
        let notifier = Arc::new(RecordingNotifier::default());
        let store = ExpansionStore::spawn(MemoryBackend::default()).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let coordinator = ExpansionCoordinator::new(
            DataSources::new(Arc::new(local), Arc::new(CatalogPlatform::default())),
            store,
            notifier.clone(),
            tx,
        )
        .await
        .with_fetch_timeout(Duration::from_secs(1));
        let mut tree = NavTree::new();
        coordinator.load_sources(&mut tree).await;

        coordinator.toggle(&mut tree, LOCAL_SOURCE_ID, true);
        let completion = rx.recv().await.unwrap();
        assert!(matches!(
            completion.outcome,
            Err(AppError::Timeout { millis: 1000, .. })
        ));
        assert_eq!(coordinator.apply(&mut tree, completion), ApplyOutcome::Failed);
        assert!(!tree.find(LOCAL_SOURCE_ID).unwrap().loading);
        assert!(notifier.failures()[0].contains("timed out"));
    }

    #[tokio::test]
    async fn expanded_nodes_are_restored_from_snapshot() {
        let mut h = Harness::new(
            workspace(),
            Arc::new(CatalogPlatform::default()),
            &[LOCAL_SOURCE_ID, "/w"],
        )
        .await;
        assert!(h.tree.find(LOCAL_SOURCE_ID).unwrap().loading);

        assert_eq!(h.next().await, ApplyOutcome::Applied { restored: 1 });
        assert_eq!(h.next().await, ApplyOutcome::Applied { restored: 0 });
        assert_eq!(h.visible(), vec!["local", "/w", "/w/sub", "/w/a.cwl"]);
    }

    #[tokio::test]
    async fn ids_stay_unique_with_overlapping_roots() {
        let local = StaticLocal::with_roots(&["/w", "/w/sub", "/w"]).folder(
            "/w",
            vec![
                FilesystemEntry::directory("/w/sub"),
                FilesystemEntry::file("/w/a.cwl", None),
            ],
        );
        let mut h = Harness::local(local).await;
        h.toggle(LOCAL_SOURCE_ID, true);
        h.next().await;
        h.toggle("/w", true);
        h.next().await;

        let rows = h.visible();
        let unique: HashSet<&String> = rows.iter().collect();
        assert_eq!(unique.len(), rows.len());
        assert_eq!(rows, vec!["local", "/w", "/w/a.cwl", "/w/sub"]);
    }

    #[tokio::test]
    async fn platform_projects_are_disambiguated_and_apps_listed() {
        let platform = CatalogPlatform::new(serde_json::from_str(CATALOG).unwrap());
        let mut h = Harness::new(StaticLocal::default(), Arc::new(platform), &[]).await;
        let roots: Vec<&str> = h.tree.roots().map(|r| r.id()).collect();
        assert_eq!(roots, vec!["local", "sbg"]);

        h.toggle("sbg", true);
        h.next().await;
        let labels: Vec<&str> = h
            .tree
            .children_of("sbg")
            .iter()
            .map(|n| n.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Demo", "Demo (B)"]);

        h.toggle("sbg/A/demo", true);
        h.next().await;
        let app = h.tree.find("sbg/A/demo/bwa").unwrap();
        assert_eq!(app.kind, NodeKind::App);
        assert_eq!(app.parent(), Some("sbg/A/demo"));
    }

    #[tokio::test]
    async fn unreachable_platform_still_initializes_local() {
        let h = Harness::new(workspace(), Arc::new(UnreachablePlatform), &[]).await;
        let roots: Vec<&str> = h.tree.roots().map(|r| r.id()).collect();
        assert_eq!(roots, vec![LOCAL_SOURCE_ID]);
        assert_eq!(h.notifier.failures(), vec!["Source error: platform offline".to_string()]);
    }

    #[tokio::test]
    async fn expand_then_collapse_leaves_persisted_set_unchanged() {
        let mut h = Harness::local(workspace()).await;
        let before = h.store.get_expanded_ids().await;
        h.toggle(LOCAL_SOURCE_ID, true);
        h.toggle(LOCAL_SOURCE_ID, false);
        assert_eq!(h.store.get_expanded_ids().await, before);

        h.toggle(LOCAL_SOURCE_ID, true);
        assert!(h.store.get_expanded_ids().await.contains(LOCAL_SOURCE_ID));
    }

    #[tokio::test]
    async fn leaves_do_not_toggle() {
        let mut h = Harness::local(workspace()).await;
        h.toggle(LOCAL_SOURCE_ID, true);
        h.next().await;
        h.toggle("/w", true);
        h.next().await;
        assert!(!h.toggle("/w/a.cwl", true));
        assert!(!h.toggle("/nope", true));
        assert!(h.store.get_expanded_ids().await.iter().all(|id| id != "/w/a.cwl"));
    }
}
