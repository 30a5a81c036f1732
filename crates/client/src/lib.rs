//! Client code for shellcache.
//!
//! This crate provides the upstream fetch pipeline and the offline cache
//! controller shared by the proxy and the admin CLI.

pub mod controller;
pub mod fetch;

pub use controller::{
    ActivateReport, ControllerConfig, Event, InstallReport, LifecycleState, Outcome, Route, ShellController,
};
pub use fetch::{FetchClient, FetchConfig, Network};
