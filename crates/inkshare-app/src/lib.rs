//! inkshare Application
//!
//! Headless client shell: configuration, history loading, scripted pointer
//! input and the session loop that drives the reconciler and renderer.

mod app;
mod config;
mod history;
mod script;

pub use app::{App, AppError, run};
pub use config::{AppConfig, Args, guest_name};
pub use history::{HistorySource, write_snapshot};
pub use script::{PointerScript, ScriptStep};
