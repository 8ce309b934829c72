//! Error type for command store operations.

use std::error::Error;
use std::fmt;

/// Errors from [`CommandStore`](crate::CommandStore) operations.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandError {
    /// No command with this id is registered.
    UnknownCommand {
        /// The `group:name` id.
        id: String,
    },
    /// A slider operation was applied to a button, or vice versa.
    WrongKind {
        /// The `group:name` id.
        id: String,
        /// The kind the operation expected.
        expected: &'static str,
    },
    /// A group definition is malformed.
    InvalidGroup {
        /// The group name.
        group: String,
        /// What is wrong.
        reason: String,
    },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand { id } => write!(f, "unknown command '{id}'"),
            Self::WrongKind { id, expected } => {
                write!(f, "command '{id}' is not a {expected}")
            }
            Self::InvalidGroup { group, reason } => {
                write!(f, "invalid command group '{group}': {reason}")
            }
        }
    }
}

impl Error for CommandError {}
