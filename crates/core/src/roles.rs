//! Typed actor roles.
//!
//! Role names arrive as strings from the identity provider (JWT claims);
//! they are parsed into [`Role`] at the boundary so the rest of the domain
//! never branches on raw strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// The four actor roles of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Unit owner who files service requests.
    Client,
    /// Field worker assigned to carry out a service request.
    Technician,
    /// Company that built the development a unit belongs to.
    ConstructingCompany,
    /// Platform administrator with unconditional access.
    Admin,
}

impl Role {
    /// Canonical lowercase name, as stored in JWT claims and audit metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Technician => "technician",
            Role::ConstructingCompany => "constructing_company",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "technician" => Ok(Role::Technician),
            "constructing_company" => Ok(Role::ConstructingCompany),
            "admin" => Ok(Role::Admin),
            other => Err(CoreError::Unauthorized(format!("Unknown role '{other}'"))),
        }
    }
}

/// An authenticated caller attempting an operation.
///
/// Credentials are verified upstream; the core trusts the `(id, role)` pair
/// it is handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: DbId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: DbId, role: Role) -> Self {
        Self { id, role }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_its_name() {
        for role in [
            Role::Client,
            Role::Technician,
            Role::ConstructingCompany,
            Role::Admin,
        ] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("superuser".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
        // Role names are exact, not case-insensitive.
        assert!("Admin".parse::<Role>().is_err());
    }
}
