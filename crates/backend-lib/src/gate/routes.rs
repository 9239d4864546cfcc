//! Static route table for the request gate.
use serde::{Deserialize, Serialize};
use taller_common::Role;

/// Access class of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "min_role", rename_all = "snake_case")]
pub enum RouteAccess {
    Public,
    Protected,
    RoleRestricted(Role),
}

/// One prefix rule. Longest matching prefix wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub prefix: String,
    pub access: RouteAccess,
}

impl RouteRule {
    pub fn new(prefix: impl Into<String>, access: RouteAccess) -> Self {
        Self {
            prefix: prefix.into(),
            access,
        }
    }

    /// `/admin` matches `/admin` and `/admin/x` but not `/administrator`;
    /// `/static/` matches everything below it.
    fn matches(&self, path: &str) -> bool {
        let prefix = self.prefix.as_str();
        if prefix.ends_with('/') {
            path.starts_with(prefix) || path == prefix.trim_end_matches('/')
        } else {
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
    }
}

/// How the gate should treat one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteClass {
    pub access: RouteAccess,
    /// API routes answer 401 instead of redirecting, and accept bearer tokens
    pub api: bool,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    /// Sorted longest prefix first
    rules: Vec<RouteRule>,
}

/// Rules used when the configuration names none
pub fn default_rules() -> Vec<RouteRule> {
    use RouteAccess::*;
    vec![
        RouteRule::new("/login", Public),
        RouteRule::new("/api/auth/login", Public),
        RouteRule::new("/api/auth/refresh", Public),
        RouteRule::new("/api/auth/logout", Public),
        RouteRule::new("/api/health", Public),
        RouteRule::new("/static/", Public),
        RouteRule::new("/favicon.ico", Public),
        RouteRule::new("/admin", RoleRestricted(Role::Admin)),
        RouteRule::new("/api/admin/", RoleRestricted(Role::Admin)),
        RouteRule::new("/api/reports/", RoleRestricted(Role::Supervisor)),
    ]
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl RouteTable {
    pub fn new(mut rules: Vec<RouteRule>) -> Self {
        rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { rules }
    }

    /// Classify `path`. Anything unmatched is protected.
    pub fn classify(&self, path: &str) -> RouteClass {
        let api = path == "/api" || path.starts_with("/api/");

        // Dot segments never get the benefit of a public prefix.
        if path.split('/').any(|segment| segment == "..") {
            return RouteClass {
                access: RouteAccess::Protected,
                api,
            };
        }

        let access = self
            .rules
            .iter()
            .find(|rule| rule.matches(path))
            .map_or(RouteAccess::Protected, |rule| rule.access);
        RouteClass { access, api }
    }
}
