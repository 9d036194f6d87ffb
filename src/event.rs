use std::time::Duration;

use async_trait::async_trait;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, MouseEvent};
use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::nav::collaborators::{Notifier, Tab, Workbox};

/// Something the engine wants the user to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Failure(String),
    Opened(Tab),
}

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// A key press event.
    Key(KeyEvent),
    /// A mouse event.
    Mouse(MouseEvent),
    /// A periodic tick for rendering.
    Tick,
    /// Terminal resize event.
    #[allow(dead_code)]
    Resize(u16, u16),
    /// A failure report or an opened tab.
    Notice(Notice),
}

/// Async event handler that polls crossterm events and forwards them via a channel.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Create a new EventHandler with the given tick rate.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::task::spawn_blocking(move || loop {
            let forwarded = if event::poll(tick_rate).unwrap_or(false) {
                match event::read() {
                    Ok(CrosstermEvent::Key(key)) => event_tx.send(Event::Key(key)),
                    Ok(CrosstermEvent::Mouse(mouse)) => event_tx.send(Event::Mouse(mouse)),
                    Ok(CrosstermEvent::Resize(w, h)) => event_tx.send(Event::Resize(w, h)),
                    _ => Ok(()),
                }
            } else {
                event_tx.send(Event::Tick)
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { rx, tx }
    }

    /// Get a sender clone for collaborators that report back to the UI.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event (blocks until available).
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| AppError::Terminal("Event channel closed".into()))
    }
}

/// Routes engine failures to the status bar.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify_failure(&self, error: &AppError) {
        tracing::debug!(error = %error, "reporting failure");
        let _ = self
            .tx
            .send(Event::Notice(Notice::Failure(error.to_string())));
    }
}

/// Opens tabs by announcing them to the UI.
///
/// Local files must exist; platform app ids are taken as they are.
#[derive(Debug, Clone)]
pub struct StatusWorkbox {
    tx: mpsc::UnboundedSender<Event>,
}

impl StatusWorkbox {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Workbox for StatusWorkbox {
    async fn open_or_create_tab(&self, id: &str) -> Result<Tab> {
        if id.is_empty() {
            return Err(AppError::InvalidPath("empty tab id".into()));
        }
        if id.starts_with('/') && tokio::fs::metadata(id).await.is_err() {
            return Err(AppError::InvalidPath(format!("{} does not exist", id)));
        }
        Ok(Tab::new(id))
    }

    fn open_tab(&self, tab: Tab) {
        let _ = self.tx.send(Event::Notice(Notice::Opened(tab)));
    }
}
