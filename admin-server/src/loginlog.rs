//! Login log recorder
//!
//! Fire-and-forget: the login handler calls [`record`], which spawns the
//! write so authentication latency never depends on it. Region and client
//! parsing are best-effort local heuristics.

use shared::util::now_millis;
use sqlx::PgPool;

use crate::db::login_logs::{self, NewLoginLog};

/// Record a login attempt without blocking the caller
pub fn record(
    pool: PgPool,
    username: String,
    success: bool,
    ip: String,
    user_agent: Option<String>,
    message: Option<String>,
) {
    tokio::spawn(async move {
        let region = lookup_region(&ip);
        let (browser, os) = user_agent.as_deref().map(parse_user_agent).unwrap_or((None, None));

        let entry = NewLoginLog {
            username: &username,
            success,
            ip: &ip,
            region: region.as_deref(),
            browser: browser.as_deref(),
            os: os.as_deref(),
            message: message.as_deref(),
            created_at: now_millis(),
        };

        if let Err(e) = login_logs::insert(&pool, entry).await {
            tracing::error!(username, "Failed to write login log: {e}");
        }
    });
}

/// Coarse region classification of an IP address
fn lookup_region(ip: &str) -> Option<String> {
    if ip == "127.0.0.1" || ip == "::1" || ip == "localhost" {
        return Some("localhost".to_string());
    }
    let private = ip.starts_with("10.")
        || ip.starts_with("192.168.")
        || (ip.strip_prefix("172.")
            .and_then(|rest| rest.split('.').next())
            .and_then(|octet| octet.parse::<u8>().ok())
            .is_some_and(|o| (16..=31).contains(&o)));
    if private {
        return Some("internal".to_string());
    }
    None
}

/// Best-effort browser and OS extraction from a User-Agent string
fn parse_user_agent(ua: &str) -> (Option<String>, Option<String>) {
    let browser = if ua.contains("Edg/") {
        Some("Edge")
    } else if ua.contains("Chrome/") {
        Some("Chrome")
    } else if ua.contains("Firefox/") {
        Some("Firefox")
    } else if ua.contains("Safari/") {
        Some("Safari")
    } else if ua.contains("curl/") {
        Some("curl")
    } else {
        None
    };

    let os = if ua.contains("Windows") {
        Some("Windows")
    } else if ua.contains("Android") {
        Some("Android")
    } else if ua.contains("iPhone") || ua.contains("iPad") {
        Some("iOS")
    } else if ua.contains("Mac OS X") {
        Some("macOS")
    } else if ua.contains("Linux") {
        Some("Linux")
    } else {
        None
    };

    (browser.map(String::from), os.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_localhost_and_private() {
        assert_eq!(lookup_region("127.0.0.1").as_deref(), Some("localhost"));
        assert_eq!(lookup_region("10.1.2.3").as_deref(), Some("internal"));
        assert_eq!(lookup_region("192.168.0.5").as_deref(), Some("internal"));
        assert_eq!(lookup_region("172.20.0.1").as_deref(), Some("internal"));
        assert_eq!(lookup_region("172.32.0.1"), None);
        assert_eq!(lookup_region("203.0.113.7"), None);
    }

    #[test]
    fn test_parse_chrome_on_windows() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        let (browser, os) = parse_user_agent(ua);
        assert_eq!(browser.as_deref(), Some("Chrome"));
        assert_eq!(os.as_deref(), Some("Windows"));
    }

    #[test]
    fn test_parse_edge_beats_chrome() {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) Chrome/120.0 Edg/120.0";
        let (browser, os) = parse_user_agent(ua);
        assert_eq!(browser.as_deref(), Some("Edge"));
        assert_eq!(os.as_deref(), Some("macOS"));
    }

    #[test]
    fn test_parse_unknown_agent() {
        let (browser, os) = parse_user_agent("weird-client/1.0");
        assert_eq!(browser, None);
        assert_eq!(os, None);
    }
}
