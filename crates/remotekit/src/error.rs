use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while looking up a machine's credential.
///
/// Every variant means "do not contact this machine".
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No store has a secret for the machine
    #[error("no credential for machine {machine}")]
    Missing {
        /// Machine label
        machine: String,
    },

    /// The secret cannot be delivered as a single line
    #[error("credential for machine {machine} contains a line break")]
    InvalidSecret {
        /// Machine label
        machine: String,
    },

    /// A credential file exists but cannot be parsed
    #[error("invalid credential store {}: {message}", path.display())]
    Store {
        /// Path of the store file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// A credential file exists but cannot be read
    #[error("failed to read credential store {}: {source}", path.display())]
    Io {
        /// Path of the store file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl CredentialError {
    /// Returns true if the machine simply has no secret
    pub fn is_missing(&self) -> bool {
        matches!(self, CredentialError::Missing { .. })
    }
}

/// Errors raised by the session layer.
///
/// Failures of the script itself never show up here; they only appear in
/// the relayed output and the footer totals.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote host rejected the login; nothing was sent
    #[error("{machine}: authentication failed: {message}")]
    Authentication {
        /// Machine label
        machine: String,
        /// Client diagnostics
        message: String,
    },

    /// The remote host could not be reached; nothing was sent
    #[error("{machine}: connection failed: {message}")]
    Connection {
        /// Machine label
        machine: String,
        /// Client diagnostics
        message: String,
    },

    /// The transport client program is not installed
    #[error("transport client '{program}' not found in PATH")]
    ClientNotFound {
        /// Program name
        program: String,
    },

    /// Reading from or writing to the session failed
    #[error("{machine}: session I/O error: {source}")]
    Io {
        /// Machine label
        machine: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The worker running a non-blocking session panicked
    #[error("{machine}: session worker panicked")]
    WorkerPanicked {
        /// Machine label
        machine: String,
    },
}

impl TransportError {
    /// Build an I/O error for a machine
    pub fn io(machine: &str, source: std::io::Error) -> Self {
        TransportError::Io {
            machine: machine.to_string(),
            source,
        }
    }

    /// Machine the error belongs to, when known
    pub fn machine(&self) -> Option<&str> {
        match self {
            TransportError::Authentication { machine, .. }
            | TransportError::Connection { machine, .. }
            | TransportError::Io { machine, .. }
            | TransportError::WorkerPanicked { machine } => Some(machine),
            TransportError::ClientNotFound { .. } => None,
        }
    }

    /// Returns true if the failure happened before any script content was sent
    pub fn is_pre_send(&self) -> bool {
        matches!(
            self,
            TransportError::Authentication { .. }
                | TransportError::Connection { .. }
                | TransportError::ClientNotFound { .. }
        )
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let auth = TransportError::Authentication {
            machine: "r1".into(),
            message: "Permission denied (publickey).".into(),
        };
        assert!(auth.is_pre_send());
        assert_eq!(auth.machine(), Some("r1"));

        let io = TransportError::io("r1", std::io::Error::other("broken pipe"));
        assert!(!io.is_pre_send());

        let missing = CredentialError::Missing {
            machine: "d1".into(),
        };
        assert!(missing.is_missing());
        assert_eq!(missing.to_string(), "no credential for machine d1");
    }
}
