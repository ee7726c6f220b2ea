use std::fmt::{Display, Formatter};
use std::str::FromStr;

use lineage_core::AppError;
use serde::{Deserialize, Serialize};

use crate::RoleId;

const ID_PREFIX: &str = "id:";

/// Reference to a role assigned to a principal.
///
/// The upstream auth layer supplies either a bare role name or a role id.
/// References are resolved once, at the guard boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleRef {
    /// Role referenced by its unique name.
    ByName(String),
    /// Role referenced by its stable id.
    ById(RoleId),
}

impl Display for RoleRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ByName(name) => formatter.write_str(name),
            Self::ById(role_id) => write!(formatter, "{ID_PREFIX}{role_id}"),
        }
    }
}

/// Parses `id:<n>` as an id reference and anything else as a name reference.
impl FromStr for RoleRef {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::Validation(
                "role reference must not be empty".to_owned(),
            ));
        }

        match value.strip_prefix(ID_PREFIX) {
            Some(raw_id) => raw_id.parse::<RoleId>().map(Self::ById),
            None => Ok(Self::ByName(value.to_owned())),
        }
    }
}
