use std::time::Duration;

use crate::credential::Credential;
use crate::error::Result;
use crate::sink::OutputLine;

#[cfg(feature = "ssh")]
pub mod ssh;

/// Where a machine's session connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Machine label
    pub machine: String,
    /// Host name or address (defaults to the machine label)
    pub host: String,
    pub user: Option<String>,
    pub port: Option<u16>,
}

impl Target {
    pub fn new(machine: impl Into<String>) -> Self {
        let machine = machine.into();
        Self {
            host: machine.clone(),
            machine,
            user: None,
            port: None,
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    /// `user@host`, or just `host`
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }
}

/// Result of polling a session for output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Line(OutputLine),
    /// Nothing arrived within the wait
    Pending,
    /// Both output streams are closed
    Closed,
}

/// Transport trait for remote script execution
///
/// This trait abstracts the underlying implementation, allowing us to:
/// - Shell out to the system `ssh` client
/// - Mock for testing
pub trait Transport: Send + Sync {
    /// Authenticate and open a session; no script content is sent yet
    fn open(&self, target: &Target, credential: &Credential) -> Result<Box<dyn Session>>;
}

/// One open remote command-execution session
pub trait Session: Send {
    /// Transmit the script for remote interpretation and close the input
    fn send(&mut self, script: &str) -> Result<()>;

    /// Wait up to `wait` for the next line of output
    fn next_output(&mut self, wait: Duration) -> Output;

    /// Wait for the remote command to end and return its exit code
    fn wait(&mut self) -> Result<i32>;

    /// Tear down the local end of the session
    fn kill(&mut self) -> Result<()>;
}
