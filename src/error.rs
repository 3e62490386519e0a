// src/error.rs
//! Error taxonomy shared by the fetcher, store, notifier and generation seams.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RadarError {
    /// Request to the upstream listing or the generation service did not complete.
    #[error("network error: {0}")]
    Network(String),

    /// Response body was not in the expected shape.
    #[error("upstream format error: {0}")]
    UpstreamFormat(String),

    /// No credential configured; generation is not attempted.
    #[error("credential missing")]
    CredentialMissing,

    /// Generation request completed but the response was unusable.
    #[error("generation failure: {0}")]
    GenerationFailure(String),

    /// Platform declined to show a notification.
    #[error("notification unavailable: {0}")]
    NotificationUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// Command bridge worker is gone or dropped the reply.
    #[error("bridge closed")]
    BridgeClosed,
}

pub type Result<T> = std::result::Result<T, RadarError>;
