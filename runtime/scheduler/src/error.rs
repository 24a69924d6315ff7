use std::fmt;

use crate::attribute::Attribute;

/// Explicit outcomes of `send`. Both are recoverable at the call site; the
/// runtime never drops a message silently on these paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// No actor type accepting this message type is registered.
    NoHandler { message_type: &'static str },
    /// A group exists but every member is draining or gone.
    NoReceiver { message_type: &'static str },
}

impl SendError {
    pub fn message_type(&self) -> &'static str {
        match self {
            SendError::NoHandler { message_type } => message_type,
            SendError::NoReceiver { message_type } => message_type,
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::NoHandler { message_type } => {
                write!(f, "no actor accepts messages of type `{message_type}`")
            }
            SendError::NoReceiver { message_type } => {
                write!(
                    f,
                    "no live actor remains for messages of type `{message_type}`"
                )
            }
        }
    }
}

impl std::error::Error for SendError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Another live scheduler is already bound to the Attribute.
    AttributeTaken(Attribute),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::AttributeTaken(attribute) => {
                write!(f, "a scheduler is already registered as `{attribute}`")
            }
        }
    }
}

impl std::error::Error for RegistryError {}
