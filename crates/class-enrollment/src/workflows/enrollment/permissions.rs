use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Staff roles observed in the academy back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Superadmin,
    Admin,
    Staff,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Superadmin => "SUPERADMIN",
            Self::Admin => "ADMIN",
            Self::Staff => "STAFF",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUPERADMIN" => Some(Self::Superadmin),
            "ADMIN" => Some(Self::Admin),
            "STAFF" => Some(Self::Staff),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewEnrollments,
    ManageEnrollments,
    AssignClasses,
    CompleteEnrollments,
    ManageClasses,
    ManagePayments,
    PromoteWaitlist,
    ManagePricing,
}

impl Permission {
    pub const fn name(self) -> &'static str {
        match self {
            Self::ViewEnrollments => "enrollments:view",
            Self::ManageEnrollments => "enrollments:manage",
            Self::AssignClasses => "classes:assign",
            Self::CompleteEnrollments => "enrollments:complete",
            Self::ManageClasses => "classes:manage",
            Self::ManagePayments => "payments:manage",
            Self::PromoteWaitlist => "waitlist:promote",
            Self::ManagePricing => "pricing:manage",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("role {role} lacks permission {permission}")]
pub struct PermissionDenied {
    pub role: Role,
    pub permission: Permission,
}

/// Authorization hook consulted by callers before invoking engine operations.
pub trait PermissionGate: Send + Sync {
    fn check_permission(&self, role: Role, permission: Permission) -> Result<(), PermissionDenied>;
}

/// Static role to permission grants.
#[derive(Debug, Clone)]
pub struct RolePermissions {
    grants: HashMap<Role, HashSet<Permission>>,
}

impl RolePermissions {
    pub fn standard() -> Self {
        let staff = [
            Permission::ViewEnrollments,
            Permission::ManageEnrollments,
            Permission::AssignClasses,
        ];
        let admin = [
            Permission::CompleteEnrollments,
            Permission::ManageClasses,
            Permission::ManagePayments,
            Permission::PromoteWaitlist,
        ];

        let staff_grants: HashSet<Permission> = staff.into_iter().collect();
        let admin_grants: HashSet<Permission> =
            staff_grants.iter().copied().chain(admin).collect();
        let superadmin_grants: HashSet<Permission> = admin_grants
            .iter()
            .copied()
            .chain([Permission::ManagePricing])
            .collect();

        let mut grants = HashMap::new();
        grants.insert(Role::Staff, staff_grants);
        grants.insert(Role::Admin, admin_grants);
        grants.insert(Role::Superadmin, superadmin_grants);
        Self { grants }
    }
}

impl Default for RolePermissions {
    fn default() -> Self {
        Self::standard()
    }
}

impl PermissionGate for RolePermissions {
    fn check_permission(&self, role: Role, permission: Permission) -> Result<(), PermissionDenied> {
        let granted = self
            .grants
            .get(&role)
            .map(|grants| grants.contains(&permission))
            .unwrap_or(false);

        if granted {
            Ok(())
        } else {
            Err(PermissionDenied { role, permission })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_can_assign_but_not_archive() {
        let gate = RolePermissions::standard();
        assert!(gate
            .check_permission(Role::Staff, Permission::AssignClasses)
            .is_ok());
        let denied = gate
            .check_permission(Role::Staff, Permission::ManageClasses)
            .expect_err("staff cannot manage classes");
        assert_eq!(denied.to_string(), "role STAFF lacks permission classes:manage");
    }

    #[test]
    fn only_superadmin_manages_pricing() {
        let gate = RolePermissions::standard();
        assert!(gate
            .check_permission(Role::Admin, Permission::ManagePricing)
            .is_err());
        assert!(gate
            .check_permission(Role::Superadmin, Permission::ManagePricing)
            .is_ok());
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(Role::parse(" admin "), Some(Role::Admin));
        assert_eq!(Role::parse("teacher"), None);
    }
}
