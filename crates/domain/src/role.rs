//! Role identity, names and capability sets.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use lineage_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Maximum accepted length of a role name.
pub const ROLE_NAME_MAX_LENGTH: usize = 100;

/// Store-assigned role identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(i64);

impl RoleId {
    /// Creates a role identifier from a stored integer key.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer key.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for RoleId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid role id '{value}': {error}")))
    }
}

/// Unique, immutable role name. Doubles as a capability token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleName(String);

impl RoleName {
    /// Creates a validated role name.
    ///
    /// Surrounding whitespace is trimmed. The trimmed value must be non-empty
    /// and at most [`ROLE_NAME_MAX_LENGTH`] characters long.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = NonEmptyString::new(value.trim())
            .map_err(|_| AppError::Validation("role name must not be empty".to_owned()))?;

        if trimmed.as_str().chars().count() > ROLE_NAME_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "role name must not exceed {ROLE_NAME_MAX_LENGTH} characters"
            )));
        }

        Ok(Self(trimmed.into()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RoleName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Opaque capability token owned by a role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    /// Creates a capability token, trimming surrounding whitespace.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "capability must not be empty".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Parses a list of transport values into a capability set.
    pub fn parse_set<I, S>(values: I) -> AppResult<BTreeSet<Self>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        values.into_iter().map(Self::new).collect()
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// A named permission bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: RoleName,
    description: Option<String>,
    capabilities: BTreeSet<Capability>,
}

impl Role {
    /// Creates a role record.
    #[must_use]
    pub fn new(
        id: RoleId,
        name: RoleName,
        description: Option<String>,
        capabilities: BTreeSet<Capability>,
    ) -> Self {
        Self {
            id,
            name,
            description,
            capabilities,
        }
    }

    /// Returns the stable role identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the unique role name.
    #[must_use]
    pub fn name(&self) -> &RoleName {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the capabilities owned directly by this role, without the implicit name.
    #[must_use]
    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// Replaces the description.
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Replaces the directly owned capability set.
    pub fn set_capabilities(&mut self, capabilities: BTreeSet<Capability>) {
        self.capabilities = capabilities;
    }

    /// Returns true when `target` is this role's name or one of its own capabilities.
    ///
    /// This is the direct-match test only; inherited grants are resolved elsewhere.
    #[must_use]
    pub fn grants_directly(&self, target: &str) -> bool {
        self.name.as_str() == target
            || self
                .capabilities
                .iter()
                .any(|capability| capability.as_str() == target)
    }

    /// Iterates the role's own grant tokens: its name followed by its capabilities.
    pub fn own_grants(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.capabilities.iter().map(Capability::as_str))
    }
}
