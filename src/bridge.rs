//! Command bridge between UI processes and the engine.
//!
//! Requests are JSON objects tagged by `action`. Each request carries its own
//! oneshot reply channel, which stays open until that request resolves; slow
//! commands (generation) do not hold up fast ones.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{Preferences, Profile};
use crate::engine::{CycleOutcome, Engine};
use crate::error::{RadarError, Result};
use crate::ingest::types::Item;

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    RefreshProjects,
    GenerateBid {
        #[serde(default)]
        description: String,
    },
    /// Reset the badge counter.
    FormatBadge,
    /// Mark every stored item as seen.
    ClearNewFlags,
    OpenProject {
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    ValidateApiKey {
        #[serde(default)]
        api_key: String,
    },
    SaveSettings {
        #[serde(default)]
        preferences: Option<Preferences>,
        #[serde(default)]
        profile: Option<Profile>,
    },
    GetProjects,
    GetTheme,
    #[serde(rename_all = "camelCase")]
    SetTheme {
        dark_mode: bool,
    },
}

impl Command {
    /// Wire name of the command.
    pub fn action(&self) -> &'static str {
        match self {
            Command::RefreshProjects => "refreshProjects",
            Command::GenerateBid { .. } => "generateBid",
            Command::FormatBadge => "formatBadge",
            Command::ClearNewFlags => "clearNewFlags",
            Command::OpenProject { .. } => "openProject",
            Command::ValidateApiKey { .. } => "validateApiKey",
            Command::SaveSettings { .. } => "saveSettings",
            Command::GetProjects => "getProjects",
            Command::GetTheme => "getTheme",
            Command::SetTheme { .. } => "setTheme",
        }
    }
}

// Credentials show up only as their length.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::GenerateBid { description } => f
                .debug_struct("GenerateBid")
                .field("description_len", &description.len())
                .finish(),
            Command::OpenProject { url } => f.debug_struct("OpenProject").field("url", url).finish(),
            Command::ValidateApiKey { api_key } => f
                .debug_struct("ValidateApiKey")
                .field("api_key_len", &api_key.len())
                .finish(),
            Command::SaveSettings {
                preferences,
                profile,
            } => f
                .debug_struct("SaveSettings")
                .field("preferences", preferences)
                .field("profile", profile)
                .finish(),
            Command::SetTheme { dark_mode } => f.debug_struct("SetTheme").field("dark_mode", dark_mode).finish(),
            other => f.write_str(other.action()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Bid { bid: String },
    Valid { valid: bool },
    Projects { projects: Vec<Item> },
    Theme {
        #[serde(rename = "darkMode")]
        dark_mode: bool,
    },
    Failure { success: bool, error: String },
    Success { success: bool },
}

impl Response {
    pub fn ok() -> Self {
        Response::Success { success: true }
    }

    pub fn failure(e: impl ToString) -> Self {
        Response::Failure {
            success: false,
            error: e.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Response::Failure { .. })
    }
}

fn done(r: Result<()>) -> Response {
    match r {
        Ok(()) => Response::ok(),
        Err(e) => Response::failure(e),
    }
}

#[derive(Clone)]
pub struct Bridge {
    engine: Arc<Engine>,
}

impl Bridge {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, cmd: Command) -> Response {
        tracing::debug!(target: "bridge", action = cmd.action(), "command");
        let e = &self.engine;
        match cmd {
            Command::RefreshProjects => match e.run_cycle().await {
                CycleOutcome::Completed(_) | CycleOutcome::Skipped => Response::ok(),
                CycleOutcome::Failed(err) => Response::failure(err),
            },
            Command::GenerateBid { description } => Response::Bid {
                bid: e.generate_bid(&description).await.text,
            },
            Command::FormatBadge => done(e.reset_badge().await),
            Command::ClearNewFlags => done(e.mark_all_seen().await.map(|_| ())),
            Command::OpenProject { url } => done(e.open_item(&url).await),
            Command::ValidateApiKey { api_key } => Response::Valid {
                valid: e.validate_credential(&api_key).await,
            },
            Command::SaveSettings {
                preferences,
                profile,
            } => done(e.save_settings(preferences, profile).await),
            Command::GetProjects => match e.projects().await {
                Ok(projects) => Response::Projects { projects },
                Err(err) => Response::failure(err),
            },
            Command::GetTheme => match e.dark_mode().await {
                Ok(dark_mode) => Response::Theme { dark_mode },
                Err(err) => Response::failure(err),
            },
            Command::SetTheme { dark_mode } => done(e.set_dark_mode(dark_mode).await),
        }
    }
}

struct Envelope {
    cmd: Command,
    reply: oneshot::Sender<Response>,
}

/// Sending side of the bridge; cheap to clone into each client.
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<Envelope>,
}

impl BridgeHandle {
    pub async fn request(&self, cmd: Command) -> Result<Response> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { cmd, reply })
            .await
            .map_err(|_| RadarError::BridgeClosed)?;
        rx.await.map_err(|_| RadarError::BridgeClosed)
    }
}

/// Spawn the bridge worker. Every request runs on its own task.
pub fn spawn_bridge(bridge: Bridge, capacity: usize) -> (BridgeHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Envelope>(capacity.max(1));
    let worker = tokio::spawn(async move {
        while let Some(Envelope { cmd, reply }) = rx.recv().await {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                let resp = bridge.handle(cmd).await;
                if reply.send(resp).is_err() {
                    tracing::debug!(target: "bridge", "requester went away before reply");
                }
            });
        }
    });
    (BridgeHandle { tx }, worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_parse_from_action_tagged_json() {
        let cases = [
            (json!({"action": "refreshProjects"}), Command::RefreshProjects),
            (
                json!({"action": "generateBid", "description": "Need a CLI"}),
                Command::GenerateBid {
                    description: "Need a CLI".into(),
                },
            ),
            (json!({"action": "formatBadge"}), Command::FormatBadge),
            (json!({"action": "clearNewFlags"}), Command::ClearNewFlags),
            (
                json!({"action": "validateApiKey", "apiKey": "sk-1"}),
                Command::ValidateApiKey {
                    api_key: "sk-1".into(),
                },
            ),
            (
                json!({"action": "setTheme", "darkMode": true}),
                Command::SetTheme { dark_mode: true },
            ),
            (
                json!({"action": "saveSettings", "profile": {"name": "Ada"}}),
                Command::SaveSettings {
                    preferences: None,
                    profile: Some(Profile {
                        name: "Ada".into(),
                        ..Profile::default()
                    }),
                },
            ),
        ];
        for (v, want) in cases {
            let got: Command = serde_json::from_value(v.clone()).unwrap();
            assert_eq!(got, want, "{v}");
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(serde_json::from_value::<Command>(json!({"action": "reloadExtension"})).is_err());
    }

    #[test]
    fn responses_serialize_flat() {
        assert_eq!(serde_json::to_value(Response::ok()).unwrap(), json!({"success": true}));
        assert_eq!(
            serde_json::to_value(Response::Theme { dark_mode: false }).unwrap(),
            json!({"darkMode": false})
        );
        assert_eq!(
            serde_json::to_value(Response::failure("boom")).unwrap(),
            json!({"success": false, "error": "boom"})
        );
    }

    #[test]
    fn debug_output_hides_credentials() {
        let save = Command::SaveSettings {
            preferences: Some(Preferences {
                api_key: "sk-SECRET".into(),
                ..Preferences::default()
            }),
            profile: None,
        };
        let validate = Command::ValidateApiKey {
            api_key: "sk-SECRET".into(),
        };
        for cmd in [save, validate] {
            let out = format!("{cmd:?}");
            assert!(!out.contains("sk-SECRET"), "{out}");
            assert!(out.contains("api_key_len: 9"), "{out}");
        }
        assert_eq!(format!("{:?}", Command::GetTheme), "getTheme");
    }

    #[test]
    fn action_matches_wire_tag() {
        let cmd = Command::SetTheme { dark_mode: true };
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v["action"], cmd.action());
        let v = serde_json::to_value(Command::ClearNewFlags).unwrap();
        assert_eq!(v["action"], Command::ClearNewFlags.action());
    }
}
