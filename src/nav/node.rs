use crate::sources::{AppDescriptor, FilesystemEntry, ProjectDescriptor, SourceDescriptor};

/// Reserved id of the local filesystem source.
pub const LOCAL_SOURCE_ID: &str = "local";

/// Globally unique, hierarchical node identifier.
pub type NodeId = String;

/// Kind of a navigation node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Source,
    Project,
    Folder,
    File,
    App,
}

impl NodeKind {
    /// Directory-like kinds have children that can be fetched.
    pub fn is_directory_like(self) -> bool {
        match self {
            NodeKind::Source | NodeKind::Project | NodeKind::Folder => true,
            NodeKind::File | NodeKind::App => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Source => "source",
            NodeKind::Project => "project",
            NodeKind::Folder => "folder",
            NodeKind::File => "file",
            NodeKind::App => "app",
        }
    }
}

/// Domain payload carried by a navigation node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// A root source; the local source carries no descriptor.
    Source(Option<SourceDescriptor>),
    Project {
        source_id: String,
        project: ProjectDescriptor,
    },
    /// A local folder or file.
    Entry(FilesystemEntry),
    App(AppDescriptor),
}
