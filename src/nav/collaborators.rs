//! Outward-facing collaborators: failure reporting and tab opening.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::nav::model::TreeNode;
use crate::nav::node::{NodeData, NodeKind};

/// Receives failures that should be shown to the user.
pub trait Notifier: Send + Sync {
    fn notify_failure(&self, error: &AppError);
}

/// An editor tab for an opened document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: String,
    pub title: String,
}

impl Tab {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let title = crate::sources::last_segment(&id).to_string();
        Self { id, title }
    }
}

/// Materializes tabs for opened nodes and search results.
#[async_trait]
pub trait Workbox: Send + Sync {
    async fn open_or_create_tab(&self, id: &str) -> Result<Tab>;
    fn open_tab(&self, tab: Tab);
}

/// Tab id for opening a node: apps by node id, files by path. Other kinds don't open.
pub fn open_target(node: &TreeNode<NodeData>) -> Option<String> {
    match (node.kind, &node.data) {
        (NodeKind::App, _) => Some(node.id().to_string()),
        (NodeKind::File, NodeData::Entry(entry)) => Some(entry.path.clone()),
        (NodeKind::File, _) => Some(node.id().to_string()),
        (NodeKind::Source | NodeKind::Project | NodeKind::Folder, _) => None,
    }
}

/// Open or create the tab for `target` in the background.
pub fn spawn_open(
    workbox: Arc<dyn Workbox>,
    notifier: Arc<dyn Notifier>,
    target: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match workbox.open_or_create_tab(&target).await {
            Ok(tab) => {
                debug!(tab = %tab.id, "opening tab");
                workbox.open_tab(tab);
            }
            Err(e) => notifier.notify_failure(&e),
        }
    })
}
