//! Unified error codes for the admin backend
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: User / department errors
//! - 4xxx: Role / menu errors
//! - 5xxx: Log errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Codes are represented as u16 values for efficient serialization and
/// cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Invalid credentials (username/password)
    InvalidCredentials = 1002,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid (malformed or bad signature)
    TokenInvalid = 1004,
    /// Session has been revoked (logout / password change)
    SessionRevoked = 1005,
    /// Account is disabled
    AccountDisabled = 1006,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Admin role required
    AdminRequired = 2002,

    // ==================== 3xxx: User / Department ====================
    /// User not found
    UserNotFound = 3001,
    /// Username already taken
    UsernameExists = 3002,
    /// Department not found
    DeptNotFound = 3003,
    /// Department still has child departments
    DeptHasChildren = 3004,
    /// Department move would create a cycle
    DeptCycle = 3005,
    /// Department still has users
    DeptHasUsers = 3006,

    // ==================== 4xxx: Role / Menu ====================
    /// Role not found
    RoleNotFound = 4001,
    /// Role name already taken
    RoleNameExists = 4002,
    /// Role is still assigned to users
    RoleInUse = 4003,
    /// Menu not found
    MenuNotFound = 4004,
    /// Menu still has child menus
    MenuHasChildren = 4005,
    /// Custom data scope requires a department list
    CustomScopeNeedsDepts = 4006,

    // ==================== 5xxx: Log ====================
    /// Log entry not found
    LogNotFound = 5001,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Encryption / decryption error
    CryptoError = 9003,
}

impl ErrorCode {
    /// Get the numeric code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the default message for this code
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "OK",
            Self::Unknown => "Unknown error",
            Self::ValidationFailed => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::AlreadyExists => "Resource already exists",
            Self::InvalidRequest => "Invalid request",

            Self::NotAuthenticated => "Authentication required",
            Self::InvalidCredentials => "Invalid username or password",
            Self::TokenExpired => "Token expired",
            Self::TokenInvalid => "Invalid token",
            Self::SessionRevoked => "Session revoked",
            Self::AccountDisabled => "Account disabled",

            Self::PermissionDenied => "Permission denied",
            Self::AdminRequired => "Admin role required",

            Self::UserNotFound => "User not found",
            Self::UsernameExists => "Username already exists",
            Self::DeptNotFound => "Department not found",
            Self::DeptHasChildren => "Department has child departments",
            Self::DeptCycle => "Department move would create a cycle",
            Self::DeptHasUsers => "Department still has users",

            Self::RoleNotFound => "Role not found",
            Self::RoleNameExists => "Role name already exists",
            Self::RoleInUse => "Role is still assigned to users",
            Self::MenuNotFound => "Menu not found",
            Self::MenuHasChildren => "Menu has child menus",
            Self::CustomScopeNeedsDepts => "Custom data scope requires departments",

            Self::LogNotFound => "Log entry not found",

            Self::InternalError => "Internal server error",
            Self::DatabaseError => "Database error",
            Self::CryptoError => "Encryption error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code as u16
    }
}

/// Error returned when converting an unknown u16 into [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => Self::Success,
            1 => Self::Unknown,
            2 => Self::ValidationFailed,
            3 => Self::NotFound,
            4 => Self::AlreadyExists,
            5 => Self::InvalidRequest,

            1001 => Self::NotAuthenticated,
            1002 => Self::InvalidCredentials,
            1003 => Self::TokenExpired,
            1004 => Self::TokenInvalid,
            1005 => Self::SessionRevoked,
            1006 => Self::AccountDisabled,

            2001 => Self::PermissionDenied,
            2002 => Self::AdminRequired,

            3001 => Self::UserNotFound,
            3002 => Self::UsernameExists,
            3003 => Self::DeptNotFound,
            3004 => Self::DeptHasChildren,
            3005 => Self::DeptCycle,
            3006 => Self::DeptHasUsers,

            4001 => Self::RoleNotFound,
            4002 => Self::RoleNameExists,
            4003 => Self::RoleInUse,
            4004 => Self::MenuNotFound,
            4005 => Self::MenuHasChildren,
            4006 => Self::CustomScopeNeedsDepts,

            5001 => Self::LogNotFound,

            9001 => Self::InternalError,
            9002 => Self::DatabaseError,
            9003 => Self::CryptoError,

            other => return Err(InvalidErrorCode(other)),
        };
        Ok(code)
    }
}
