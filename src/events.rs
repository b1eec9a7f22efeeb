//! Operation events for shellarch archive operations.
//!
//! Observers register callbacks on an [`crate::Archiver`] and receive one
//! terminal event per operation, plus progress events scraped from the
//! external tool's output while it runs.

use std::sync::{Arc, RwLock};

use regex::Regex;
use serde::Serialize;

/// A signal emitted while an archive operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ArchiverEvent {
    /// The external tool reported a completion percentage.
    Progress { percent: u8 },
    /// The operation finished successfully.
    Success,
    /// The operation failed; `message` is the rendered error.
    Error { message: String },
    /// The operation was terminated by a stop request.
    Stopped,
}

/// Event callback function type.
pub type EventCallback = dyn Fn(ArchiverEvent) + Send + Sync;

/// Fan-out of [`ArchiverEvent`]s to registered callbacks.
///
/// Cloning is cheap and all clones share the same subscriber list, so the
/// runner tasks and the archiver can emit through the same bus.
#[derive(Clone, Default)]
pub(crate) struct EventBus {
    callbacks: Arc<RwLock<Vec<Arc<EventCallback>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback that receives every event from now on.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(ArchiverEvent) + Send + Sync + 'static,
    {
        self.callbacks.write().unwrap().push(Arc::new(callback));
    }

    /// Deliver `event` to every registered callback, in registration order.
    ///
    /// The subscriber list is copied out before any callback runs, so a
    /// callback may itself subscribe without deadlocking on the list lock.
    pub fn emit(&self, event: ArchiverEvent) {
        let callbacks: Vec<Arc<EventCallback>> = self.callbacks.read().unwrap().clone();
        for callback in callbacks {
            callback(event.clone());
        }
    }
}

fn percent_pattern() -> &'static Regex {
    use std::sync::OnceLock;
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{1,3})\s*%").expect("percent pattern is valid"))
}

/// Extract every `NN%` completion figure from a chunk of tool output.
///
/// Values above 100 are clamped; the tools only ever report 0-100 but the
/// scraper must not trust them.
pub(crate) fn scan_percents(text: &str) -> Vec<u8> {
    percent_pattern()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<u16>().ok())
        .map(|value| value.min(100) as u8)
        .collect()
}
