//! Where the external picker UI is shown: a separate window, or the current
//! page via full navigation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationMode {
    #[default]
    Popup,
    /// Never try a separate window; always navigate away.
    Redirect,
}

pub trait TargetWindow: Send + Sync {
    fn is_closed(&self) -> bool;
    /// Points the window at `uri`; false if it could not be loaded.
    fn load(&self, uri: &str) -> bool;
}

pub trait WindowHost: Send + Sync {
    /// Blank window opened before the session exists, so it is tied to the user gesture.
    fn pre_open(&self) -> Option<Box<dyn TargetWindow>>;
    fn open(&self, uri: &str) -> Option<Box<dyn TargetWindow>>;
    /// Replaces the current page with `uri`.
    fn navigate(&self, uri: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shown {
    InWindow,
    /// No window could be used; caller must persist and then call [`Presenter::redirect`].
    NeedsRedirect { popup_blocked: bool },
}

pub struct Presenter {
    host: Arc<dyn WindowHost>,
    mode: PresentationMode,
}

impl Presenter {
    pub fn new(host: Arc<dyn WindowHost>, mode: PresentationMode) -> Self {
        Self { host, mode }
    }

    pub fn prepare(&self) -> Option<Box<dyn TargetWindow>> {
        if self.mode == PresentationMode::Redirect {
            return None;
        }
        self.host.pre_open().filter(|w| !w.is_closed())
    }

    pub fn show(&self, pre_opened: Option<Box<dyn TargetWindow>>, uri: &str) -> Shown {
        if self.mode == PresentationMode::Redirect {
            return Shown::NeedsRedirect { popup_blocked: false };
        }

        let mut attempted = pre_opened.is_some();
        let target = match pre_opened.filter(|w| !w.is_closed()) {
            Some(window) => Some(window),
            None => {
                attempted = true;
                self.host.open(uri).filter(|w| !w.is_closed())
            }
        };

        match target {
            Some(window) if window.load(uri) => {
                tracing::info!("[Picker] opened picker in a separate window");
                Shown::InWindow
            }
            _ => Shown::NeedsRedirect {
                popup_blocked: attempted,
            },
        }
    }

    pub fn redirect(&self, uri: &str) {
        self.host.navigate(uri);
    }
}

/// Terminal stand-in: prints the picker URL for the user to open.
pub struct ConsoleWindowHost;

struct ConsoleWindow;

impl TargetWindow for ConsoleWindow {
    fn is_closed(&self) -> bool {
        false
    }

    fn load(&self, uri: &str) -> bool {
        eprintln!("Open this URL to pick photos:\n  {}", uri);
        true
    }
}

impl WindowHost for ConsoleWindowHost {
    fn pre_open(&self) -> Option<Box<dyn TargetWindow>> {
        None
    }

    fn open(&self, _uri: &str) -> Option<Box<dyn TargetWindow>> {
        Some(Box::new(ConsoleWindow))
    }

    fn navigate(&self, uri: &str) {
        eprintln!("Continue picking at:\n  {}\nthen run `photo-relay resume`.", uri);
    }
}
