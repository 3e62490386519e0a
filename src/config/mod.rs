// src/config/mod.rs
pub mod daemon;
pub mod preferences;

pub use daemon::DaemonConfig;
pub use preferences::{Preferences, Profile};
