//! Controller lifecycle: states, events and their outcomes.

use std::fmt;

use serde::Serialize;
use shellcache_core::{ShellRequest, ShellResponse};

/// Where a controller is in its lifecycle.
///
/// `Installing` → `Activating` → `Serving`. There is no way back; a new
/// version gets a new controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Waiting for the shell set to be cached.
    Installing,
    /// Shell cached; stale stores not yet purged.
    Activating,
    /// In control of every client.
    Serving,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installing => "installing",
            Self::Activating => "activating",
            Self::Serving => "serving",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to [`ShellController::dispatch`](super::ShellController::dispatch).
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(ShellRequest),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Fetch(_) => "fetch",
        }
    }
}

/// Result of a dispatched event.
#[derive(Debug, Clone)]
pub enum Outcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Response(ShellResponse),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub store: String,
    /// Number of shell pages written.
    pub cached: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub store: String,
    /// Stale stores deleted, oldest first.
    pub purged: Vec<String>,
}
