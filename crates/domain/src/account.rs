use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_core::{AppResult, NonEmptyString};

/// Unique identifier for a throttled account.
///
/// Foreign to the account entity itself; this component never owns or
/// resolves the account it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Creates a new random account identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an account identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for AccountId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// The two facts about an account this component is allowed to know: its
/// identifier and the login shown to humans in gate failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    id: AccountId,
    login: NonEmptyString,
}

impl AccountRef {
    /// Creates an account reference with a validated login.
    pub fn new(id: AccountId, login: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            id,
            login: NonEmptyString::new(login)?,
        })
    }

    /// Returns the account identifier.
    #[must_use]
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Returns the login used to address the account in messages.
    #[must_use]
    pub fn login(&self) -> &str {
        self.login.as_str()
    }
}
