//! Roles and room names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// Roles that carry a room of their own. Any other role id is a valid
/// identity that only receives the `global` room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    SuperAdmin,
    Admin,
    Investor,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::SuperAdmin, Role::Admin, Role::Investor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "superadmin",
            Role::Admin => "admin",
            Role::Investor => "investor",
        }
    }

    /// Rooms a freshly connected user of this role joins, besides `global`.
    pub fn default_rooms(&self) -> &'static [&'static str] {
        match self {
            Role::SuperAdmin => &["superadmin", "admin"],
            Role::Admin => &["admin"],
            Role::Investor => &["investor"],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "superadmin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "investor" => Ok(Role::Investor),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

const COMPANY_ADMIN_PREFIX: &str = "admin_";

/// Name of a broadcast group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn global() -> Self {
        Self::new("global")
    }

    pub fn for_role(role: Role) -> Self {
        Self::new(role.as_str())
    }

    /// `admin_<companyId>`: admins of one (sub-)company.
    pub fn company_admins(company_id: &EntityId) -> Self {
        Self(format!("{COMPANY_ADMIN_PREFIX}{company_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_global(&self) -> bool {
        self.0 == "global"
    }

    /// The role this room belongs to, if it is a role room.
    pub fn role(&self) -> Option<Role> {
        self.0.parse().ok()
    }

    /// The company id, if this is a company-admin room.
    pub fn company_id(&self) -> Option<EntityId> {
        self.0
            .strip_prefix(COMPANY_ADMIN_PREFIX)
            .filter(|rest| !rest.is_empty())
            .map(EntityId::from)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
