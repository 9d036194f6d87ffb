//! Capability interfaces the navigation engine calls, and the descriptor
//! types that flow through them.
//!
//! The engine only ever sees these traits. `local` and `catalog` hold the
//! concrete adapters the binary ships with.

pub mod catalog;
pub mod local;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Connection status reported for a platform source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Connected,
    Connecting,
    Disconnected,
}

/// Document class of a runnable description (file on disk or platform app).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentClass {
    Workflow,
    CommandLineTool,
    #[serde(other)]
    Other,
}

impl DocumentClass {
    /// Parse a class name, returning `None` for anything unrecognised.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "Workflow" => Some(Self::Workflow),
            "CommandLineTool" => Some(Self::CommandLineTool),
            _ => None,
        }
    }

    /// Whether entries of this class can be dragged onto a canvas.
    pub fn is_runnable(self) -> bool {
        matches!(self, Self::Workflow | Self::CommandLineTool)
    }
}

/// A top-level platform source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub status: ConnectionState,
}

/// A project inside a platform source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub name: String,
    pub owner: String,
    pub slug: String,
}

/// An app inside a platform project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDescriptor {
    pub id: String,
    pub label: String,
    pub class: DocumentClass,
}

/// One entry of a local folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemEntry {
    /// Absolute path of the entry.
    pub path: String,
    pub is_dir: bool,
    /// Detected document class, for files only.
    pub class: Option<DocumentClass>,
}

impl FilesystemEntry {
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            class: None,
        }
    }

    pub fn file(path: impl Into<String>, class: Option<DocumentClass>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            class,
        }
    }

    /// Final path segment, used as the display label.
    pub fn name(&self) -> &str {
        last_segment(&self.path)
    }
}

/// Final `/`-separated segment of a path, or the whole path for `/`.
pub fn last_segment(path: &str) -> &str {
    match path.trim_end_matches('/').rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment,
        _ => path,
    }
}

/// A search hit as returned by a provider, before ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    pub id: String,
    pub title: String,
    pub label: String,
    pub class: Option<DocumentClass>,
    /// Provider-local base relevance; larger is more relevant.
    pub relevance: f64,
}

impl RawResult {
    /// A hit on a local file: titled by file name, labelled by its two parent folders.
    pub fn local_file(path: &str, class: Option<DocumentClass>, relevance: f64) -> Self {
        let segments: Vec<&str> = path.split('/').collect();
        let parents = if segments.len() >= 3 {
            segments[segments.len() - 3..segments.len() - 1].join("/")
        } else {
            segments[..segments.len().saturating_sub(1)].join("/")
        };
        Self {
            id: path.to_string(),
            title: last_segment(path).to_string(),
            label: parents,
            class,
            relevance,
        }
    }

    /// A hit on a platform app, identified by its position in the tree.
    pub fn remote_app(
        source_id: &str,
        project: &ProjectDescriptor,
        app: &AppDescriptor,
        relevance: f64,
    ) -> Self {
        Self {
            id: format!("{}/{}/{}/{}", source_id, project.owner, project.slug, app.id),
            title: app.label.clone(),
            label: format!("{} → {}", project.owner, project.name),
            class: Some(app.class),
            relevance,
        }
    }
}

/// Listings of the local filesystem.
#[async_trait]
pub trait LocalSource: Send + Sync {
    /// Paths of the configured local roots.
    async fn list_local_root(&self) -> Result<Vec<String>>;

    /// Immediate children of a local folder.
    async fn list_local_folder(&self, path: &str) -> Result<Vec<FilesystemEntry>>;
}

/// Listings of remote platform sources, their projects, and project apps.
#[async_trait]
pub trait PlatformSource: Send + Sync {
    async fn list_platform_sources(&self) -> Result<Vec<SourceDescriptor>>;

    async fn list_platform_projects(&self, source_id: &str) -> Result<Vec<ProjectDescriptor>>;

    async fn list_project_apps(
        &self,
        source_id: &str,
        owner: &str,
        slug: &str,
    ) -> Result<Vec<AppDescriptor>>;
}

/// A catalog that can answer free-text queries.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Origin tag attached to every result from this provider.
    fn name(&self) -> &str;

    async fn search(&self, term: &str) -> Result<Vec<RawResult>>;
}
