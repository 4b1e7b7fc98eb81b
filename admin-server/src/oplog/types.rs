//! Operation log record types

use serde::{Deserialize, Serialize};

/// Outcome classification derived from the response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpOutcome {
    /// 2xx / 3xx
    Success,
    /// 4xx
    BusinessError,
    /// 5xx
    Exception,
}

impl OpOutcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=399 => Self::Success,
            400..=499 => Self::BusinessError,
            _ => Self::Exception,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::BusinessError => "business_error",
            Self::Exception => "exception",
        }
    }
}

/// One captured request, ready for persistence
#[derive(Debug, Clone)]
pub struct OpLogRecord {
    pub username: Option<String>,
    /// Permission identifier the route required, if any
    pub permission: Option<String>,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Redacted request body, JSON only
    pub body: Option<serde_json::Value>,
    pub status: i16,
    pub outcome: OpOutcome,
    pub ip: String,
    pub user_agent: Option<String>,
    pub latency_ms: i64,
    pub created_at: i64,
}

/// Identity of the authenticated caller, attached to response extensions
/// by the auth middleware so the outer capture middleware can read it
#[derive(Debug, Clone)]
pub struct AuditIdentity {
    pub user_id: i64,
    pub username: String,
}

/// Permission identifier a route required, attached to response extensions
/// by the permission middleware for both granted and denied requests
#[derive(Debug, Clone, Copy)]
pub struct RequiredPermission(pub &'static str);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_status() {
        assert_eq!(OpOutcome::from_status(200), OpOutcome::Success);
        assert_eq!(OpOutcome::from_status(302), OpOutcome::Success);
        assert_eq!(OpOutcome::from_status(403), OpOutcome::BusinessError);
        assert_eq!(OpOutcome::from_status(500), OpOutcome::Exception);
    }
}
