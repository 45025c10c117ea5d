//! Newline-delimited JSON wire protocol between `holdtotalkctl` and the
//! `holdtotalkd` control socket.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Status,
    Stop,
    Models,
    Model { name: String },
    Continuous { enabled: bool },
    MicWarm { enabled: bool },
    Reload,
}

impl Command {
    /// Parses the operator-facing argv form: `status`, `stop`, `models`,
    /// `model <name>`, `continuous on|off`, `mic-warm on|off`, `reload`.
    pub fn parse(args: &[String]) -> Option<Self> {
        match args {
            [cmd] if cmd == "status" => Some(Self::Status),
            [cmd] if cmd == "stop" => Some(Self::Stop),
            [cmd] if cmd == "models" => Some(Self::Models),
            [cmd] if cmd == "reload" => Some(Self::Reload),
            [cmd, name] if cmd == "model" => Some(Self::Model { name: name.clone() }),
            [cmd, toggle] if cmd == "continuous" => parse_toggle(toggle).map(|enabled| Self::Continuous { enabled }),
            [cmd, toggle] if cmd == "mic-warm" => parse_toggle(toggle).map(|enabled| Self::MicWarm { enabled }),
            _ => None,
        }
    }
}

fn parse_toggle(arg: &str) -> Option<bool> {
    match arg {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { message: Option<String> },
    Error { message: String },
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self::Ok { message: Some(message.into()) }
    }

    pub fn ok_empty() -> Self {
        Self::Ok { message: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    /// 0 on success, 1 on `error: …` per the operator-surface contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Ok { .. } => 0,
            Self::Error { .. } => 1,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Ok { message: Some(m) } => m.clone(),
            Self::Ok { message: None } => "ok".to_string(),
            Self::Error { message } => format!("error: {message}"),
        }
    }
}
