//! Platform adapter backed by a JSON catalog of sources, projects and apps.
//!
//! The catalog file looks like:
//!
//! ```json
//! { "sources": [
//!     { "id": "sbg", "label": "Seven Bridges", "status": "connected",
//!       "projects": [
//!         { "name": "Demo", "owner": "ana", "slug": "demo",
//!           "apps": [ { "id": "bwa", "label": "BWA", "class": "CommandLineTool" } ] } ] } ] }
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::sources::{
    AppDescriptor, PlatformSource, ProjectDescriptor, RawResult, SearchProvider, SourceDescriptor,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub sources: Vec<CatalogSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSource {
    #[serde(flatten)]
    pub descriptor: SourceDescriptor,
    #[serde(default)]
    pub projects: Vec<CatalogProject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogProject {
    #[serde(flatten)]
    pub descriptor: ProjectDescriptor,
    #[serde(default)]
    pub apps: Vec<AppDescriptor>,
}

impl Catalog {
    fn source(&self, source_id: &str) -> Result<&CatalogSource> {
        self.sources
            .iter()
            .find(|s| s.descriptor.id == source_id)
            .ok_or_else(|| AppError::Source(format!("unknown source '{}'", source_id)))
    }
}

/// Serves platform listings out of an in-memory [`Catalog`].
#[derive(Debug, Clone, Default)]
pub struct CatalogPlatform {
    catalog: Arc<Catalog>,
}

impl CatalogPlatform {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    /// Load a catalog file from disk.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let catalog: Catalog = serde_json::from_str(&content)?;
        Ok(Self::new(catalog))
    }

    /// A search provider over the same catalog.
    pub fn search_provider(&self) -> CatalogSearch {
        CatalogSearch {
            catalog: Arc::clone(&self.catalog),
        }
    }
}

#[async_trait]
impl PlatformSource for CatalogPlatform {
    async fn list_platform_sources(&self) -> Result<Vec<SourceDescriptor>> {
        Ok(self
            .catalog
            .sources
            .iter()
            .map(|s| s.descriptor.clone())
            .collect())
    }

    async fn list_platform_projects(&self, source_id: &str) -> Result<Vec<ProjectDescriptor>> {
        Ok(self
            .catalog
            .source(source_id)?
            .projects
            .iter()
            .map(|p| p.descriptor.clone())
            .collect())
    }

    async fn list_project_apps(
        &self,
        source_id: &str,
        owner: &str,
        slug: &str,
    ) -> Result<Vec<AppDescriptor>> {
        let project = self
            .catalog
            .source(source_id)?
            .projects
            .iter()
            .find(|p| p.descriptor.owner == owner && p.descriptor.slug == slug)
            .ok_or_else(|| {
                AppError::Source(format!(
                    "unknown project '{}/{}' in '{}'",
                    owner, slug, source_id
                ))
            })?;
        Ok(project.apps.clone())
    }
}

/// Fuzzy search over the app labels of every catalog project.
#[derive(Debug, Clone)]
pub struct CatalogSearch {
    catalog: Arc<Catalog>,
}

#[async_trait]
impl SearchProvider for CatalogSearch {
    fn name(&self) -> &str {
        "remote-projects"
    }

    async fn search(&self, term: &str) -> Result<Vec<RawResult>> {
        let matcher = SkimMatcherV2::default();
        let mut results = Vec::new();
        for source in &self.catalog.sources {
            for project in &source.projects {
                for app in &project.apps {
                    if let Some(score) = matcher.fuzzy_match(&app.label, term) {
                        results.push(RawResult::remote_app(
                            &source.descriptor.id,
                            &project.descriptor,
                            app,
                            score as f64 / 100.0,
                        ));
                    }
                }
            }
        }
        Ok(results)
    }
}
