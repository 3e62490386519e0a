// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod badge;
pub mod bridge;
pub mod change_detector;
pub mod config;
pub mod engine;
pub mod error;
pub mod generate;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::bridge::{spawn_bridge, Bridge, BridgeHandle, Command, Response};
pub use crate::engine::{CycleOutcome, CycleReport, Engine, EngineParts, UiEvent};
pub use crate::error::{RadarError, Result};
