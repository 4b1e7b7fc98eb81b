//! Data scope model
//!
//! A role carries a [`ScopeMode`] describing which rows its holders may see.
//! Resolution combines the modes of all active roles into a single
//! [`DataScope`] that query code applies as a filter.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Data scope mode as stored on a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMode {
    /// All departments
    All,
    /// Own department and all descendants
    OwnAndBelow,
    /// Own department only
    Own,
    /// Only rows created by the user themselves
    SelfOnly,
    /// Explicit department list attached to the role
    Custom,
}

impl ScopeMode {
    /// Decode the database representation
    pub fn from_db(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::All),
            1 => Some(Self::OwnAndBelow),
            2 => Some(Self::Own),
            3 => Some(Self::SelfOnly),
            4 => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn as_db(self) -> i16 {
        match self {
            Self::All => 0,
            Self::OwnAndBelow => 1,
            Self::Own => 2,
            Self::SelfOnly => 3,
            Self::Custom => 4,
        }
    }
}

/// Effective data scope after combining all active roles
///
/// Ordered from widest to narrowest. Combination is additive: any role
/// granting `All` wins, department grants union, and `SelfOnly` is the
/// floor when no role grants anything wider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataScope {
    /// Unrestricted
    All,
    /// Restricted to a set of department ids
    Depts(BTreeSet<i64>),
    /// Restricted to rows owned by the user
    SelfOnly,
}

impl DataScope {
    /// Whether a row in `dept_id`, created by `creator_id`, is visible
    /// to `user_id` under this scope
    pub fn allows(&self, user_id: i64, creator_id: i64, dept_id: Option<i64>) -> bool {
        match self {
            Self::All => true,
            Self::Depts(depts) => dept_id.is_some_and(|d| depts.contains(&d)),
            Self::SelfOnly => creator_id == user_id,
        }
    }

    /// The department ids this scope restricts to, if it is a department scope
    pub fn dept_ids(&self) -> Option<&BTreeSet<i64>> {
        match self {
            Self::Depts(depts) => Some(depts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_mode_db_roundtrip() {
        for mode in [
            ScopeMode::All,
            ScopeMode::OwnAndBelow,
            ScopeMode::Own,
            ScopeMode::SelfOnly,
            ScopeMode::Custom,
        ] {
            assert_eq!(ScopeMode::from_db(mode.as_db()), Some(mode));
        }
        assert_eq!(ScopeMode::from_db(99), None);
    }

    #[test]
    fn test_all_allows_everything() {
        assert!(DataScope::All.allows(1, 2, None));
        assert!(DataScope::All.allows(1, 2, Some(3)));
    }

    #[test]
    fn test_dept_scope() {
        let scope = DataScope::Depts(BTreeSet::from([10, 11]));
        assert!(scope.allows(1, 2, Some(10)));
        assert!(!scope.allows(1, 2, Some(12)));
        // Rows without a department are invisible under a department scope
        assert!(!scope.allows(1, 1, None));
    }

    #[test]
    fn test_self_only_scope() {
        assert!(DataScope::SelfOnly.allows(1, 1, Some(10)));
        assert!(!DataScope::SelfOnly.allows(1, 2, Some(10)));
    }
}
