mod app;
mod components;
mod config;
mod error;
mod event;
mod handler;
mod logging;
mod nav;
mod sources;
mod tui;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use crate::app::{Action, App};
use crate::config::{AppConfig, LocalConfig, PlatformConfig, SearchConfig};
use crate::event::{ChannelNotifier, Event, EventHandler, Notice, StatusWorkbox};
use crate::nav::collaborators::{spawn_open, Notifier, Workbox};
use crate::nav::coordinator::{DataSources, ExpansionCoordinator, NavTree};
use crate::nav::persistence::{ExpansionStore, JsonFileBackend, MemoryBackend};
use crate::nav::search::{JoinPolicy, PreferredKindScorer, SearchAggregator};
use crate::sources::catalog::CatalogPlatform;
use crate::sources::local::{FsLocalSource, FsSearchProvider};
use crate::sources::{PlatformSource, SearchProvider};
use crate::tui::{install_panic_hook, Tui};

/// A terminal navigator over local folders and remote platform projects.
#[derive(Parser, Debug)]
#[command(name = "navtree", version, about)]
struct Cli {
    /// Local root to display (defaults to configured roots, then the current directory)
    path: Option<PathBuf>,

    /// Path to a config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON catalog of platform sources
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Do not remember expanded nodes across sessions
    #[arg(long)]
    no_persist: bool,

    /// Show results from the providers that answered when one fails
    #[arg(long)]
    partial_search: bool,

    /// Where to write the log file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// CLI flags as a config layer on top of every file.
    fn overrides(&self) -> error::Result<AppConfig> {
        let roots = match &self.path {
            Some(path) => {
                let path = path.canonicalize().map_err(|_| {
                    error::AppError::InvalidPath(format!("{} does not exist", path.display()))
                })?;
                Some(vec![path.to_string_lossy().to_string()])
            }
            None => None,
        };
        let mut overrides = AppConfig {
            local: LocalConfig {
                roots,
                ..Default::default()
            },
            platform: PlatformConfig {
                catalog: self
                    .catalog
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
            },
            search: SearchConfig {
                join_policy: self.partial_search.then_some(JoinPolicy::Partial),
                ..Default::default()
            },
            ..Default::default()
        };
        if self.no_persist {
            overrides.expansion.persist = Some(false);
        }
        Ok(overrides)
    }
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();

    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(logging::default_log_path);
    if let Err(e) = logging::init_global(&log_path) {
        eprintln!("navtree: logging disabled ({})", e);
    }

    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()?));

    let mut roots = config.local_roots();
    if roots.is_empty() {
        roots.push(std::env::current_dir()?);
    }
    info!(roots = ?roots, log = %log_path.display(), "starting navtree");

    install_panic_hook();

    let mut tui = Tui::new(config.mouse_enabled())?;
    let mut events = EventHandler::new(Duration::from_millis(16));
    let event_tx = events.sender();

    let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier::new(event_tx.clone()));
    let workbox: Arc<dyn Workbox> = Arc::new(StatusWorkbox::new(event_tx.clone()));

    let platform = match config.catalog_path() {
        Some(path) => match CatalogPlatform::from_file(&path).await {
            Ok(platform) => platform,
            Err(e) => {
                notifier.notify_failure(&e);
                CatalogPlatform::default()
            }
        },
        None => CatalogPlatform::default(),
    };

    let store = match config.state_file() {
        Some(path) if config.persist_expansion() => {
            ExpansionStore::spawn(JsonFileBackend::new(path)).await
        }
        _ => ExpansionStore::spawn(MemoryBackend::default()).await,
    };

    let (completions_tx, mut completions_rx) = mpsc::unbounded_channel();
    let local = Arc::new(FsLocalSource::new(roots.clone()));
    let platform_source: Arc<dyn PlatformSource> = Arc::new(platform.clone());
    let coordinator = ExpansionCoordinator::new(
        DataSources::new(local, platform_source),
        store,
        notifier.clone(),
        completions_tx,
    )
    .await
    .with_fetch_timeout(config.fetch_timeout())
    .with_local_label(config.local_label());

    let (search_tx, mut search_rx) = mpsc::unbounded_channel();
    let providers: Vec<Arc<dyn SearchProvider>> = vec![
        Arc::new(FsSearchProvider::new(
            roots,
            config.search_depth(),
            config.search_limit(),
        )),
        Arc::new(platform.search_provider()),
    ];
    let aggregator = SearchAggregator::spawn(
        providers,
        Arc::new(PreferredKindScorer::new(config.preferred_kinds())),
        config.search_settings(),
        notifier.clone(),
        search_tx,
    );

    // show the frame while platform sources are listed
    let mut app = App::new(NavTree::new());
    tui.draw(&mut app)?;
    coordinator.load_sources(&mut app.tree).await;
    app.refresh_rows();

    loop {
        tui.draw(&mut app)?;

        let action = tokio::select! {
            event = events.next() => match event? {
                Event::Key(key) => handler::handle_key_event(&mut app, key),
                Event::Mouse(mouse) => {
                    handler::handle_mouse_event(&mut app, mouse);
                    None
                }
                Event::Notice(Notice::Failure(msg)) => {
                    app.set_status_message(msg, true);
                    None
                }
                Event::Notice(Notice::Opened(tab)) => {
                    app.set_status_message(format!("Opened {}", tab.title), false);
                    None
                }
                Event::Tick | Event::Resize(_, _) => None,
            },
            Some(completion) = completions_rx.recv() => {
                coordinator.apply(&mut app.tree, completion);
                app.refresh_rows();
                None
            }
            Some(update) = search_rx.recv() => {
                app.apply_search_update(update);
                None
            }
        };

        match action {
            Some(Action::Toggle { id, expanded }) => {
                coordinator.toggle(&mut app.tree, &id, expanded);
                app.refresh_rows();
            }
            Some(Action::Open(target)) => {
                spawn_open(workbox.clone(), notifier.clone(), target);
            }
            Some(Action::Search(value)) => aggregator.input(value),
            None => {}
        }

        if app.should_quit {
            break;
        }
    }

    tui.restore()?;
    info!("navtree exited");
    Ok(())
}
