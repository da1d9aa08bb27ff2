use std::{borrow::Borrow, fmt::Display};

use thiserror::Error;

/// Remote identifier of one message, used verbatim as its local filename.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct MessageId(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0:?} cannot be used as a filename")]
pub struct InvalidMessageIdError(String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageId {
    type Error = InvalidMessageIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\0']) {
            Err(InvalidMessageIdError(value))
        } else {
            Ok(Self(value))
        }
    }
}

impl TryFrom<&str> for MessageId {
    type Error = InvalidMessageIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.to_string().try_into()
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Borrow<str> for MessageId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
