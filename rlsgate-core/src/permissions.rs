//! Static role-based permission table

use crate::domain::{UserId, UserRole};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Read,
    Write,
    Delete,
    Admin,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Read => "read",
            PermissionLevel::Write => "write",
            PermissionLevel::Delete => "delete",
            PermissionLevel::Admin => "admin",
        }
    }
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type RolePermissions = HashMap<&'static str, &'static [PermissionLevel]>;

use PermissionLevel::{Admin, Delete, Read, Write};

const FULL: &[PermissionLevel] = &[Read, Write, Delete, Admin];
const MANAGE: &[PermissionLevel] = &[Read, Write, Delete];
const EDIT: &[PermissionLevel] = &[Read, Write];
const VIEW: &[PermissionLevel] = &[Read];
const REPORT: &[PermissionLevel] = &[Read, Admin];

lazy_static! {
    /// resource → role → granted levels
    static ref RESOURCE_PERMISSIONS: HashMap<&'static str, RolePermissions> = {
        let crud: RolePermissions =
            [("admin", FULL), ("manager", MANAGE), ("rep", EDIT), ("bdr", EDIT)].into();

        let mut table = HashMap::new();
        table.insert("contacts", crud.clone());
        table.insert("companies", crud.clone());
        table.insert("actions", crud);
        table.insert(
            "users",
            [("admin", FULL), ("manager", VIEW), ("rep", VIEW), ("bdr", VIEW)].into(),
        );
        table.insert(
            "analytics",
            [("admin", REPORT), ("manager", VIEW), ("rep", VIEW), ("bdr", VIEW)].into(),
        );
        table
    };
}

/// Whether `role` holds `level` on `resource`.
///
/// Unknown resources and roles without an entry are denied.
pub fn validate_permission(role: &str, resource: &str, level: PermissionLevel) -> bool {
    let Some(roles) = RESOURCE_PERMISSIONS.get(resource) else {
        tracing::warn!(resource, "No permissions defined for resource");
        return false;
    };

    let Some(levels) = roles.get(role) else {
        tracing::warn!(role, resource, "No permissions defined for role on resource");
        return false;
    };

    levels.contains(&level)
}

/// Own data always; admins and managers may read anyone in their organization
pub fn can_access_user_data(
    requesting_role: UserRole,
    target_user: UserId,
    requesting_user: UserId,
) -> bool {
    if requesting_user == target_user {
        return true;
    }

    // TODO: restrict managers to rep/bdr targets once the target role is passed in
    matches!(requesting_role, UserRole::Admin | UserRole::Manager)
}
