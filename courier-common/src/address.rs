//! Mailbox type and the syntactic address check used before anything is
//! handed to a provider.

use std::{
    fmt::{self, Display},
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};

#[allow(clippy::unwrap_used, reason = "The pattern is a literal and known to compile")]
static ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Returns `true` if `address` has the shape `local@domain.tld`.
///
/// This is deliberately shallow: no quoting, comments or IP literals. Anything
/// it accepts is left for the provider to reject.
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS.is_match(address)
}

/// An address with an optional display name
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mailbox {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Mailbox {
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        is_valid_address(&self.email)
    }
}

impl Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => write!(f, "{}", self.email),
        }
    }
}

impl From<&str> for Mailbox {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Mailbox {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
