//! Mapping of raw adapter listings into child tree nodes.

use std::collections::{BTreeSet, HashSet};

use crate::nav::model::TreeNode;
use crate::nav::node::{NodeData, NodeKind, LOCAL_SOURCE_ID};
use crate::sources::{
    last_segment, AppDescriptor, FilesystemEntry, ProjectDescriptor, SourceDescriptor,
};

/// Snapshot of the expanded-id set used to seed new nodes.
pub type ExpandedIds = BTreeSet<String>;

/// A completed listing for one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// Paths of the local roots.
    LocalRoot(Vec<String>),
    Folder(Vec<FilesystemEntry>),
    Projects {
        source_id: String,
        projects: Vec<ProjectDescriptor>,
    },
    Apps(Vec<AppDescriptor>),
}

impl Listing {
    pub fn entry_count(&self) -> usize {
        match self {
            Listing::LocalRoot(paths) => paths.len(),
            Listing::Folder(entries) => entries.len(),
            Listing::Projects { projects, .. } => projects.len(),
            Listing::Apps(apps) => apps.len(),
        }
    }
}

/// Root nodes: the local source first, then every platform source.
pub fn source_nodes(
    local_label: &str,
    sources: Vec<SourceDescriptor>,
    expanded: &ExpandedIds,
) -> Vec<TreeNode<NodeData>> {
    let local = TreeNode::new(
        LOCAL_SOURCE_ID,
        local_label,
        NodeKind::Source,
        NodeData::Source(None),
    )
    .expanded(expanded.contains(LOCAL_SOURCE_ID));

    std::iter::once(local)
        .chain(sources.into_iter().map(|source| {
            let is_expanded = expanded.contains(&source.id);
            TreeNode::new(
                source.id.clone(),
                source.label.clone(),
                NodeKind::Source,
                NodeData::Source(Some(source)),
            )
            .expanded(is_expanded)
        }))
        .collect()
}

/// Child nodes for `parent_id` from a completed listing, in listing order.
pub fn build_children(
    parent_id: &str,
    listing: Listing,
    expanded: &ExpandedIds,
) -> Vec<TreeNode<NodeData>> {
    match listing {
        Listing::LocalRoot(paths) => paths
            .into_iter()
            .map(|path| {
                let label = last_segment(&path).to_string();
                let is_expanded = expanded.contains(&path);
                TreeNode::new(
                    path.clone(),
                    label,
                    NodeKind::Folder,
                    NodeData::Entry(FilesystemEntry::directory(path)),
                )
                .expanded(is_expanded)
            })
            .collect(),

        Listing::Folder(entries) => entries
            .into_iter()
            .map(|entry| {
                let kind = if entry.is_dir {
                    NodeKind::Folder
                } else {
                    NodeKind::File
                };
                let is_expanded = entry.is_dir && expanded.contains(&entry.path);
                TreeNode::new(
                    entry.path.clone(),
                    entry.name().to_string(),
                    kind,
                    NodeData::Entry(entry),
                )
                .expanded(is_expanded)
            })
            .collect(),

        Listing::Projects {
            source_id,
            projects,
        } => {
            let labels = disambiguate_labels(
                projects
                    .iter()
                    .map(|p| (p.name.as_str(), p.owner.as_str())),
            );
            projects
                .into_iter()
                .zip(labels)
                .map(|(project, label)| {
                    let id = format!("{}/{}/{}", parent_id, project.owner, project.slug);
                    let is_expanded = expanded.contains(&id);
                    TreeNode::new(
                        id,
                        label,
                        NodeKind::Project,
                        NodeData::Project {
                            source_id: source_id.clone(),
                            project,
                        },
                    )
                    .expanded(is_expanded)
                })
                .collect()
        }

        Listing::Apps(apps) => apps
            .into_iter()
            .map(|app| {
                let id = format!("{}/{}", parent_id, app.id);
                TreeNode::new(id, app.label.clone(), NodeKind::App, NodeData::App(app))
            })
            .collect(),
    }
}

/// Labels for `(name, owner)` pairs in order.
///
/// The first entry with a given name keeps it; every later entry with the
/// same name gets its owner appended in parentheses.
pub fn disambiguate_labels<'a, I>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    entries
        .into_iter()
        .map(|(name, owner)| {
            if seen.insert(name) {
                name.to_string()
            } else {
                format!("{} ({})", name, owner)
            }
        })
        .collect()
}
