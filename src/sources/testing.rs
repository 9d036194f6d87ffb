//! Scripted adapters and recording collaborators for engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::nav::collaborators::{Notifier, Tab, Workbox};
use crate::sources::{
    AppDescriptor, FilesystemEntry, LocalSource, PlatformSource, ProjectDescriptor, RawResult,
    SearchProvider, SourceDescriptor,
};

/// Local source answering from fixed tables.
#[derive(Default)]
pub struct StaticLocal {
    pub roots: Vec<String>,
    pub folders: HashMap<String, Vec<FilesystemEntry>>,
    pub failing: HashSet<String>,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<String>>,
}

impl StaticLocal {
    pub fn with_roots(roots: &[&str]) -> Self {
        Self {
            roots: roots.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn folder(mut self, path: &str, entries: Vec<FilesystemEntry>) -> Self {
        self.folders.insert(path.to_string(), entries);
        self
    }

    pub fn failing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LocalSource for StaticLocal {
    async fn list_local_root(&self) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push("<root>".to_string());
        self.pause().await;
        Ok(self.roots.clone())
    }

    async fn list_local_folder(&self, path: &str) -> Result<Vec<FilesystemEntry>> {
        self.calls.lock().unwrap().push(path.to_string());
        self.pause().await;
        if self.failing.contains(path) {
            return Err(AppError::Source(format!("cannot read {}", path)));
        }
        Ok(self.folders.get(path).cloned().unwrap_or_default())
    }
}

/// Platform whose every call fails.
pub struct UnreachablePlatform;

#[async_trait]
impl PlatformSource for UnreachablePlatform {
    async fn list_platform_sources(&self) -> Result<Vec<SourceDescriptor>> {
        Err(AppError::Source("platform offline".into()))
    }

    async fn list_platform_projects(&self, _source_id: &str) -> Result<Vec<ProjectDescriptor>> {
        Err(AppError::Source("platform offline".into()))
    }

    async fn list_project_apps(
        &self,
        _source_id: &str,
        _owner: &str,
        _slug: &str,
    ) -> Result<Vec<AppDescriptor>> {
        Err(AppError::Source("platform offline".into()))
    }
}

/// Search provider with per-term answers, delays and failures.
pub struct ScriptedProvider {
    name: String,
    answers: HashMap<String, Vec<RawResult>>,
    delays: HashMap<String, Duration>,
    fail_all: bool,
    pub queries: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            answers: HashMap::new(),
            delays: HashMap::new(),
            fail_all: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(mut self, term: &str, results: Vec<RawResult>) -> Self {
        self.answers.insert(term.to_string(), results);
        self
    }

    pub fn delay(mut self, term: &str, delay: Duration) -> Self {
        self.delays.insert(term.to_string(), delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, term: &str) -> Result<Vec<RawResult>> {
        self.queries.lock().unwrap().push(term.to_string());
        if let Some(delay) = self.delays.get(term) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_all {
            return Err(AppError::Source(format!("{} is down", self.name)));
        }
        Ok(self.answers.get(term).cloned().unwrap_or_default())
    }
}

/// A raw result with only a title and base relevance.
pub fn raw(title: &str, relevance: f64) -> RawResult {
    RawResult {
        id: title.to_string(),
        title: title.to_string(),
        label: String::new(),
        class: None,
        relevance,
    }
}

/// Notifier that keeps every reported failure message.
#[derive(Default)]
pub struct RecordingNotifier {
    pub failures: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_failure(&self, error: &AppError) {
        self.failures.lock().unwrap().push(error.to_string());
    }
}

/// Workbox that records opened tabs.
#[derive(Default)]
pub struct RecordingWorkbox {
    pub opened: Mutex<Vec<String>>,
}

impl RecordingWorkbox {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl Workbox for RecordingWorkbox {
    async fn open_or_create_tab(&self, id: &str) -> Result<Tab> {
        if id.is_empty() {
            return Err(AppError::InvalidPath("empty tab id".into()));
        }
        Ok(Tab::new(id))
    }

    fn open_tab(&self, tab: Tab) {
        self.opened.lock().unwrap().push(tab.id);
    }
}
