//! Caller identity and the row visibility it implies.
//!
//! The identity/role pair is produced by an external authentication
//! collaborator; this module never verifies tokens. Visibility predicates for
//! every table are derived here, in one exhaustive match over [`Role`].

use std::fmt;
use std::str::FromStr;

use findata_store::Ownership;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::query::Predicate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Anonymous,
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::User => "user",
            Self::Admin => "admin",
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

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anonymous" | "" => Ok(Self::Anonymous),
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(CoreError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// Identity/role pair as supplied by the authentication collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessInput {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub role: Role,
}

/// Immutable identity a single call executes under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext {
    user_id: Option<String>,
    role: Role,
}

/// Outcome of resolving a context against a table's ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Admin path: no predicate is applied at all.
    Bypass,
    Filtered(Predicate),
}

impl Visibility {
    #[must_use]
    pub fn into_predicate(self) -> Predicate {
        match self {
            Self::Bypass => Predicate::Always,
            Self::Filtered(predicate) => predicate,
        }
    }
}

impl AccessContext {
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            user_id: None,
            role: Role::Anonymous,
        }
    }

    #[must_use]
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            role: Role::User,
        }
    }

    #[must_use]
    pub const fn admin(user_id: Option<String>) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    /// Resolves a context from collaborator-supplied input.
    ///
    /// # Errors
    /// Returns `CoreError::Validation` when a `user` role carries no user id.
    pub fn from_input(input: AccessInput) -> CoreResult<Self> {
        let user_id = input
            .user_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        match input.role {
            Role::Anonymous => Ok(Self::anonymous()),
            Role::User => user_id
                .map(Self::user)
                .ok_or_else(|| CoreError::validation("role 'user' requires a user_id")),
            Role::Admin => Ok(Self::admin(user_id)),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Stable caller identifier for per-caller rate limiting and logs.
    #[must_use]
    pub fn caller_key(&self) -> String {
        self.user_id.as_ref().map_or_else(
            || self.role.to_string(),
            |id| format!("{}:{id}", self.role),
        )
    }

    /// Predicate a row of a table with `ownership` must satisfy to be read.
    #[must_use]
    pub fn visibility(&self, ownership: &Ownership) -> Visibility {
        match self.role {
            Role::Admin => {
                debug!(
                    target: "findata::access",
                    user_id = ?self.user_id,
                    "admin context bypasses row visibility"
                );
                Visibility::Bypass
            }
            Role::User => Visibility::Filtered(read_predicate(ownership, self.user_id())),
            Role::Anonymous => Visibility::Filtered(read_predicate(ownership, None)),
        }
    }

    /// Predicate a row must satisfy to be created, updated, or deleted.
    /// Public rows are readable by everyone but writable only by admins.
    #[must_use]
    pub fn write_scope(&self, ownership: &Ownership) -> Visibility {
        match self.role {
            Role::Admin => {
                debug!(
                    target: "findata::access",
                    user_id = ?self.user_id,
                    "admin context bypasses write scope"
                );
                Visibility::Bypass
            }
            Role::User => Visibility::Filtered(write_predicate(ownership, self.user_id())),
            Role::Anonymous => Visibility::Filtered(Predicate::Never),
        }
    }
}

fn read_predicate(ownership: &Ownership, user_id: Option<&str>) -> Predicate {
    match *ownership {
        Ownership::Public => Predicate::Always,
        Ownership::Owned { column } => Predicate::any([
            Predicate::IsNull(column),
            user_id.map_or(Predicate::Never, |id| Predicate::eq(column, id)),
        ]),
        Ownership::Child {
            foreign_key,
            parent_table,
            parent_key,
            parent,
        } => Predicate::InParent {
            foreign_key,
            parent_table,
            parent_key,
            predicate: Box::new(read_predicate(parent, user_id)),
        },
    }
}

fn write_predicate(ownership: &Ownership, user_id: Option<&str>) -> Predicate {
    match *ownership {
        Ownership::Public => Predicate::Never,
        Ownership::Owned { column } => {
            user_id.map_or(Predicate::Never, |id| Predicate::eq(column, id))
        }
        Ownership::Child {
            foreign_key,
            parent_table,
            parent_key,
            parent,
        } => match write_predicate(parent, user_id) {
            Predicate::Never => Predicate::Never,
            inner => Predicate::InParent {
                foreign_key,
                parent_table,
                parent_key,
                predicate: Box::new(inner),
            },
        },
    }
}
