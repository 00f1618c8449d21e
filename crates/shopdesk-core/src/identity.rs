//! # Identity
//!
//! Roles and the authenticated caller.
//!
//! Every service operation takes the caller as an explicit `&Identity`
//! argument; there is no ambient per-request security context.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// A user role. A user holds one or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Employee,
    Customer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Manager, Role::Employee, Role::Customer];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Employee => "EMPLOYEE",
            Role::Customer => "CUSTOMER",
        }
    }

    /// Parses a comma separated role list as stored in the users table.
    pub fn parse_list(raw: &str) -> Result<Vec<Role>, ValidationError> {
        let mut roles = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let role = part.parse::<Role>()?;
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
        Ok(roles)
    }

    /// Inverse of [`Role::parse_list`].
    pub fn join_list(roles: &[Role]) -> String {
        roles
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        // Accept the conventional ROLE_ prefix as well
        let name = upper.strip_prefix("ROLE_").unwrap_or(&upper);
        match name {
            "ADMIN" => Ok(Role::Admin),
            "MANAGER" => Ok(Role::Manager),
            "EMPLOYEE" => Ok(Role::Employee),
            "CUSTOMER" => Ok(Role::Customer),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: Role::ALL.iter().map(|r| r.to_string()).collect(),
            }),
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Identity {
    pub username: String,
    pub roles: Vec<Role>,
}

impl Identity {
    pub fn new(username: impl Into<String>, roles: Vec<Role>) -> Self {
        Identity {
            username: username.into(),
            roles,
        }
    }

    /// Background work (startup bootstrap, listeners) acts as `system`.
    pub fn system() -> Self {
        Identity::new("system", vec![Role::Admin])
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// OR semantics: true when the caller holds at least one of `allowed`.
    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        allowed.iter().any(|r| self.has_role(*r))
    }

    /// ADMIN, MANAGER or EMPLOYEE.
    pub fn is_staff(&self) -> bool {
        self.has_any_role(&[Role::Admin, Role::Manager, Role::Employee])
    }

    /// Staff see everything; customers only what is theirs.
    pub fn can_access_customer(&self, customer_username: &str) -> bool {
        self.is_staff() || self.username == customer_username
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_list_round_trip_and_dedup() {
        let roles = Role::parse_list("ADMIN, role_manager,ADMIN").unwrap();
        assert_eq!(roles, vec![Role::Admin, Role::Manager]);
        assert_eq!(Role::join_list(&roles), "ADMIN,MANAGER");
        assert!(Role::parse_list("ADMIN,OWNER").is_err());
    }

    #[test]
    fn test_has_any_role_is_or() {
        let id = Identity::new("kim", vec![Role::Employee]);
        assert!(id.has_any_role(&[Role::Admin, Role::Employee]));
        assert!(!id.has_any_role(&[Role::Admin, Role::Manager]));
        assert!(!id.has_any_role(&[]));
    }

    #[test]
    fn test_customer_access() {
        let customer = Identity::new("ana", vec![Role::Customer]);
        assert!(customer.can_access_customer("ana"));
        assert!(!customer.can_access_customer("bob"));
        assert!(Identity::new("kim", vec![Role::Employee]).can_access_customer("bob"));
    }
}
