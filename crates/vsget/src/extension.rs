//! Extension identifiers.

use std::fmt;
use std::str::FromStr;

use crate::{Result, VsgetError};

/// Identifies a marketplace extension by `(publisher, name)`.
///
/// The canonical string form is `<publisher>.<name>`, e.g.
/// `ms-python.python`. Parsing and rendering round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionId {
    publisher: String,
    name: String,
}

impl ExtensionId {
    pub fn new(publisher: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            publisher: publisher.into(),
            name: name.into(),
        }
    }

    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for ExtensionId {
    type Err = VsgetError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(publisher), Some(name), None) if !publisher.is_empty() && !name.is_empty() => {
                Ok(Self::new(publisher, name))
            }
            _ => Err(VsgetError::MalformedIdentifier(s.to_string())),
        }
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.publisher, self.name)
    }
}
