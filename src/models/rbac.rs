// src/models/rbac.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    StockController,
    Viewer,
}

pub const INVENTORY_READ: &str = "inventory:read";
pub const INVENTORY_WRITE: &str = "inventory:write";
pub const INVENTORY_APPROVE: &str = "inventory:approve";

impl Role {
    /// Permission slugs granted to the role.
    pub fn permissions(self) -> &'static [&'static str] {
        match self {
            Role::Admin | Role::Manager => &[INVENTORY_READ, INVENTORY_WRITE, INVENTORY_APPROVE],
            Role::StockController => &[INVENTORY_READ, INVENTORY_WRITE],
            Role::Viewer => &[INVENTORY_READ],
        }
    }

    pub fn has_permission(self, slug: &str) -> bool {
        self.permissions().contains(&slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_managers_and_admins_approve() {
        assert!(Role::Admin.has_permission(INVENTORY_APPROVE));
        assert!(Role::Manager.has_permission(INVENTORY_APPROVE));
        assert!(!Role::StockController.has_permission(INVENTORY_APPROVE));
        assert!(!Role::Viewer.has_permission(INVENTORY_APPROVE));
    }

    #[test]
    fn viewer_is_read_only() {
        assert!(Role::Viewer.has_permission(INVENTORY_READ));
        assert!(!Role::Viewer.has_permission(INVENTORY_WRITE));
    }

    #[test]
    fn role_uses_snake_case_on_the_wire() {
        let role: Role = serde_json::from_str("\"stock_controller\"").unwrap();
        assert_eq!(role, Role::StockController);
    }
}
