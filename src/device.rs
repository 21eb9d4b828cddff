//! Device session abstraction.
//!
//! The reconciliation engine treats the device as a black box that returns
//! configuration text and executes CLI commands. Transport, authentication,
//! and retries are the implementor's concern; the engine performs no retries
//! of its own and stops issuing commands at the first failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Named configuration stores on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigStore {
    /// The active in-memory configuration.
    Running,
    /// The persisted configuration loaded at boot.
    Startup,
}

impl std::fmt::Display for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigStore::Running => write!(f, "running"),
            ConfigStore::Startup => write!(f, "startup"),
        }
    }
}

impl std::str::FromStr for ConfigStore {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "running" => Ok(ConfigStore::Running),
            "startup" => Ok(ConfigStore::Startup),
            _ => Err(Error::InvalidParameter(format!(
                "Unknown config store '{s}'. Valid options: running, startup"
            ))),
        }
    }
}

/// A CLI command, optionally with an interactive confirmation: when the
/// device replies with `prompt`, the session answers with `answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// The command text to send.
    pub command: String,
    /// Prompt substring the device may reply with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Answer sent when the prompt appears.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl Command {
    /// A plain command with no interactive prompt.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            prompt: None,
            answer: None,
        }
    }

    /// Attach a prompt/answer pair for interactive confirmations.
    pub fn with_prompt(mut self, prompt: impl Into<String>, answer: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self.answer = Some(answer.into());
        self
    }
}

impl From<&str> for Command {
    fn from(command: &str) -> Self {
        Command::new(command)
    }
}

impl From<String> for Command {
    fn from(command: String) -> Self {
        Command::new(command)
    }
}

/// A session against a network device.
///
/// Calls are sequential and blocking from the engine's point of view; one
/// reconciliation never overlaps operations on the same session.
#[async_trait]
pub trait Device: Send + Sync {
    /// Fetch the current running configuration as raw text.
    async fn fetch_running_config(&self) -> Result<String>;

    /// Fetch a named configuration store as raw text.
    async fn fetch_named_config(&self, store: ConfigStore) -> Result<String>;

    /// Execute a single command and return the raw response.
    ///
    /// Implementations should surface a failed command as
    /// [`Error::CommandFailed`] with any captured response.
    async fn run_command(&self, command: &Command) -> Result<String>;

    /// Execute commands in order, stopping at the first failure.
    ///
    /// Any failure is surfaced as [`Error::CommandFailed`] naming the
    /// command that stopped the batch; remaining commands are not issued.
    async fn run_commands(&self, commands: &[Command]) -> Result<Vec<String>> {
        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            let response = self.run_command(command).await.map_err(|err| match err {
                Error::CommandFailed { .. } => err,
                other => Error::CommandFailed {
                    command: command.command.clone(),
                    response: other.to_string(),
                },
            })?;
            responses.push(response);
        }
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Succeeds until the scripted command, which fails at transport level.
    struct ScriptedDevice {
        executed: Mutex<Vec<String>>,
        fail_on: String,
    }

    #[async_trait]
    impl Device for ScriptedDevice {
        async fn fetch_running_config(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn fetch_named_config(&self, _store: ConfigStore) -> Result<String> {
            Ok(String::new())
        }

        async fn run_command(&self, command: &Command) -> Result<String> {
            if command.command == self.fail_on {
                return Err(Error::Device("connection reset by peer".to_string()));
            }
            self.executed.lock().unwrap().push(command.command.clone());
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_run_commands_stops_at_first_failure() {
        let device = ScriptedDevice {
            executed: Mutex::new(Vec::new()),
            fail_on: "vlan 200".to_string(),
        };
        let commands = ["vlan database", "vlan 200", "exit"].map(Command::from);

        let err = device.run_commands(&commands).await.unwrap_err();
        match err {
            Error::CommandFailed { command, response } => {
                assert_eq!(command, "vlan 200");
                assert!(response.contains("connection reset"));
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
        // Nothing after the failing command was issued.
        assert_eq!(*device.executed.lock().unwrap(), vec!["vlan database".to_string()]);
    }

    #[tokio::test]
    async fn test_run_commands_collects_responses() {
        let device = ScriptedDevice {
            executed: Mutex::new(Vec::new()),
            fail_on: String::new(),
        };
        let commands = ["vlan database", "exit"].map(Command::from);

        let responses = device.run_commands(&commands).await.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(
            *device.executed.lock().unwrap(),
            vec!["vlan database".to_string(), "exit".to_string()]
        );
    }

    #[test]
    fn test_config_store_roundtrip() {
        assert_eq!("running".parse::<ConfigStore>().unwrap(), ConfigStore::Running);
        assert_eq!("Startup".parse::<ConfigStore>().unwrap(), ConfigStore::Startup);
        assert_eq!(ConfigStore::Running.to_string(), "running");
        assert!("candidate".parse::<ConfigStore>().is_err());
    }

    #[test]
    fn test_command_prompt() {
        let cmd = Command::new("write memory").with_prompt("Are you sure you want to save", "y");
        assert_eq!(cmd.command, "write memory");
        assert_eq!(cmd.prompt.as_deref(), Some("Are you sure you want to save"));
        assert_eq!(cmd.answer.as_deref(), Some("y"));
    }
}
