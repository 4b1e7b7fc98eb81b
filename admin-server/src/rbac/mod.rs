//! Role-based access control
//!
//! Resolves a user's effective permission set and data scope from role
//! assignments, with a TTL cache that mutation endpoints invalidate
//! synchronously.

mod cache;
mod resolver;
mod scope;

pub use cache::PermissionService;
pub use resolver::{AuthUser, DeptNode, PermissionSnapshot, RbacSource, RoleGrant};
pub use scope::{DataScope, ScopeMode};
