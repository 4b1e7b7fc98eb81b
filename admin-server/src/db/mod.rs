//! Database access layer

pub mod depts;
pub mod login_logs;
pub mod menus;
pub mod operation_logs;
pub mod rbac;
pub mod roles;
pub mod users;
