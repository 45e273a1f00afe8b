//! Account roles and the access policy derived from them.

use serde::{Deserialize, Serialize};

/// Account role as reported by the backend.
///
/// The backend sends roles in SCREAMING_SNAKE_CASE. Older accounts carry the
/// legacy `USER` value (and future backends may add roles this client does
/// not know); both deserialize to [`Role::Customer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Store staff. Treated as admin-equivalent for access checks,
    /// but displayed as staff.
    Staff,
    /// Administrator.
    Admin,
    /// Regular shopper.
    #[default]
    #[serde(other)]
    Customer,
}

impl Role {
    /// Whether this role satisfies a destination's `required` role.
    ///
    /// A destination requiring [`Role::Admin`] accepts staff as well;
    /// all other requirements are exact.
    #[must_use]
    pub const fn grants(self, required: Self) -> bool {
        match required {
            Self::Admin => matches!(self, Self::Admin | Self::Staff),
            Self::Staff => matches!(self, Self::Staff),
            Self::Customer => matches!(self, Self::Customer),
        }
    }

    /// Display label for the role.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Staff => "Staff",
            Self::Admin => "Admin",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
        assert_eq!(serde_json::to_string(&Role::Staff).unwrap(), "\"STAFF\"");
        assert_eq!(
            serde_json::to_string(&Role::Customer).unwrap(),
            "\"CUSTOMER\""
        );
    }

    #[test]
    fn test_legacy_user_falls_back_to_customer() {
        let role: Role = serde_json::from_str("\"USER\"").unwrap();
        assert_eq!(role, Role::Customer);
    }

    #[test]
    fn test_unknown_role_falls_back_to_customer() {
        let role: Role = serde_json::from_str("\"SUPERVISOR\"").unwrap();
        assert_eq!(role, Role::Customer);
    }

    #[test]
    fn test_staff_is_admin_equivalent_for_access() {
        assert!(Role::Admin.grants(Role::Admin));
        assert!(Role::Staff.grants(Role::Admin));
        assert!(!Role::Customer.grants(Role::Admin));
    }

    #[test]
    fn test_non_admin_requirements_are_exact() {
        assert!(Role::Staff.grants(Role::Staff));
        assert!(!Role::Admin.grants(Role::Staff));
        assert!(!Role::Admin.grants(Role::Customer));
    }
}
