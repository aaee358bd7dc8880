//! Service commands decoded from host wake-up payloads.
//!
//! The host hands the service an opaque string. It is either a JSON object
//! such as `{"action":"update"}` or a bare action name. Anything that cannot
//! be understood decodes to [`Command::Unknown`]; decoding never fails.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A command for the fetch orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Start,
    Update,
    Stop,
    Unknown,
}

#[derive(Deserialize)]
struct ActionPayload {
    #[serde(default)]
    action: Option<String>,
}

impl Command {
    /// Wire name of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Update => "update",
            Self::Stop => "stop",
            Self::Unknown => "unknown",
        }
    }

    /// Parse an action name. Unrecognized names map to [`Command::Unknown`].
    #[must_use]
    pub fn from_action(raw: &str) -> Self {
        let action = raw.trim().trim_matches('"').trim();
        match action.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "update" => Self::Update,
            "stop" => Self::Stop,
            _ => Self::Unknown,
        }
    }

    /// Decode a host payload.
    #[must_use]
    pub fn decode(payload: Option<&str>) -> Self {
        let raw = match payload.map(str::trim) {
            None | Some("") | Some("undefined") | Some("null") => return Self::Unknown,
            Some(raw) => raw,
        };

        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Object(map)) => {
                match serde_json::from_value::<ActionPayload>(serde_json::Value::Object(map)) {
                    Ok(ActionPayload {
                        action: Some(action),
                    }) => Self::from_action(&action),
                    _ => Self::Unknown,
                }
            }
            Ok(serde_json::Value::String(action)) => Self::from_action(&action),
            Ok(_) => Self::Unknown,
            Err(_) => Self::from_action(raw),
        }
    }

    /// Encode as the JSON payload carried by an alarm.
    #[must_use]
    pub fn to_payload(self) -> String {
        serde_json::json!({ "action": self.as_str() }).to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
