//! Compile errors
//!
//! Every variant is detected before anything is sent to a host, and is
//! fatal to the single compile call that raised it.

use thiserror::Error;

/// Errors raised while building or compiling a machine's unit list.
#[derive(Debug, Error)]
pub enum CompileError {
    /// No machine with this label was declared
    #[error("no machine named '{0}' in the network")]
    UnknownMachine(String),

    /// Two machines share one label
    #[error("machine '{0}' is declared more than once")]
    DuplicateMachine(String),

    /// A machine label is unusable in scripts or file names
    #[error("invalid machine label '{label}': {reason}")]
    InvalidMachine { label: String, reason: &'static str },

    /// The action selector is not one of audit, config, dryrun
    #[error("invalid action '{0}' (expected audit, config or dryrun)")]
    InvalidAction(String),

    /// A label appears twice in one machine's script
    #[error("{machine}: label '{label}' is used by more than one unit")]
    DuplicateLabel {
        /// Machine whose script holds the clash
        machine: String,
        /// The repeated label
        label: String,
    },

    /// A label cannot be used as a shell variable name
    #[error("{machine}: invalid label '{label}': {reason}")]
    InvalidLabel {
        machine: String,
        label: String,
        reason: &'static str,
    },

    /// A precondition names a label that never appears in the script
    #[error("{machine}: unit '{unit}' depends on '{precondition}', which is not defined")]
    UnresolvedPrecondition {
        machine: String,
        unit: String,
        precondition: String,
    },

    /// A precondition names a label that is only defined later in the script
    #[error("{machine}: unit '{unit}' depends on '{precondition}', which is only defined after it")]
    ForwardReference {
        machine: String,
        unit: String,
        precondition: String,
    },

    /// The profile collaborator failed to build a machine's profile
    #[error("{machine}: failed to build profile: {message}")]
    Profile { machine: String, message: String },
}

impl CompileError {
    /// Machine the error belongs to, when there is one
    pub fn machine(&self) -> Option<&str> {
        match self {
            Self::UnknownMachine(m) | Self::DuplicateMachine(m) => Some(m),
            Self::InvalidMachine { label, .. } => Some(label),
            Self::InvalidAction(_) => None,
            Self::DuplicateLabel { machine, .. }
            | Self::InvalidLabel { machine, .. }
            | Self::UnresolvedPrecondition { machine, .. }
            | Self::ForwardReference { machine, .. }
            | Self::Profile { machine, .. } => Some(machine),
        }
    }

    /// Whether the error comes from the dependency graph of a unit list
    pub fn is_dependency_error(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedPrecondition { .. } | Self::ForwardReference { .. }
        )
    }
}

/// Result type for compile operations
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_machine() {
        let err = CompileError::ForwardReference {
            machine: "r1".into(),
            unit: "fw".into(),
            precondition: "dhcp_installed".into(),
        };
        assert_eq!(err.machine(), Some("r1"));
        assert!(err.is_dependency_error());

        let err = CompileError::InvalidAction("deploy".into());
        assert_eq!(err.machine(), None);
        assert!(!err.is_dependency_error());
    }

    #[test]
    fn test_error_messages_name_the_machine() {
        let err = CompileError::UnknownMachine("ghost".into());
        assert_eq!(err.to_string(), "no machine named 'ghost' in the network");

        let err = CompileError::UnresolvedPrecondition {
            machine: "m1".into(),
            unit: "sshd_running".into(),
            precondition: "sshd_installed".into(),
        };
        assert!(err.to_string().starts_with("m1: "));
    }
}
