//! Route policy: which paths are public, which need a real identity, and
//! which are reserved for a profile role.

use crate::identity::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A path prefix reserved for one profile role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRoute {
    /// Segment-boundary prefix (an exact path is its own prefix)
    pub prefix: String,
    pub role: Role,
}

impl RoleRoute {
    pub fn new(prefix: impl Into<String>, role: Role) -> Self {
        Self {
            prefix: prefix.into(),
            role,
        }
    }
}

/// Gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Paths that are always reachable (exact match)
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,

    /// Path prefixes that are always reachable (segment-boundary match)
    #[serde(default = "default_public_prefixes")]
    pub public_prefixes: Vec<String>,

    /// Paths that need a real identity; guests are not admitted
    #[serde(default = "default_identity_required_paths")]
    pub identity_required_paths: Vec<String>,

    /// Prefixes that need a real identity
    #[serde(default = "default_identity_required_prefixes")]
    pub identity_required_prefixes: Vec<String>,

    /// Prefixes reserved for a profile role; admins pass all of them.
    /// Matched in order, the first match wins.
    #[serde(default = "default_role_routes")]
    pub role_routes: Vec<RoleRoute>,

    /// Where viewers without identity or guest session are sent
    #[serde(default = "default_anonymous_entry_path")]
    pub anonymous_entry_path: String,

    /// Where viewers are sent when a page needs a real identity
    #[serde(default = "default_auth_required_path")]
    pub auth_required_path: String,

    /// Landing page after choosing guest access, and where a wrong role is sent
    #[serde(default = "default_home_path")]
    pub home_path: String,
}

fn default_public_paths() -> Vec<String> {
    [
        "/welcome",
        "/login",
        "/signup",
        "/forgot-password",
        "/reset-password",
        "/set-password",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

fn default_public_prefixes() -> Vec<String> {
    vec!["/auth".to_string()]
}

fn default_identity_required_paths() -> Vec<String> {
    vec!["/account".to_string(), "/settings".to_string()]
}

fn default_identity_required_prefixes() -> Vec<String> {
    Vec::new()
}

fn default_role_routes() -> Vec<RoleRoute> {
    vec![
        RoleRoute::new("/onboard", Role::Provider),
        RoleRoute::new("/business", Role::Provider),
    ]
}

fn default_anonymous_entry_path() -> String {
    "/welcome".to_string()
}

fn default_auth_required_path() -> String {
    "/login".to_string()
}

fn default_home_path() -> String {
    "/".to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            public_paths: default_public_paths(),
            public_prefixes: default_public_prefixes(),
            identity_required_paths: default_identity_required_paths(),
            identity_required_prefixes: default_identity_required_prefixes(),
            role_routes: default_role_routes(),
            anonymous_entry_path: default_anonymous_entry_path(),
            auth_required_path: default_auth_required_path(),
            home_path: default_home_path(),
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), String> {
        let all = self
            .public_paths
            .iter()
            .chain(&self.public_prefixes)
            .chain(&self.identity_required_paths)
            .chain(&self.identity_required_prefixes)
            .chain(self.role_routes.iter().map(|route| &route.prefix))
            .chain([
                &self.anonymous_entry_path,
                &self.auth_required_path,
                &self.home_path,
            ]);
        for path in all {
            if !path.starts_with('/') {
                return Err(format!("Path '{}' must start with '/'", path));
            }
        }

        let policy = RoutePolicy::from_config(self);
        for (name, path) in [
            ("anonymous_entry_path", &self.anonymous_entry_path),
            ("auth_required_path", &self.auth_required_path),
        ] {
            if policy.classify(path) != RouteAccess::Public {
                return Err(format!(
                    "{} '{}' must be public, otherwise the redirect loops",
                    name, path
                ));
            }
        }
        if let RouteAccess::RoleOnly(role) = policy.classify(&self.home_path) {
            return Err(format!(
                "home_path '{}' is reserved for role '{}', otherwise the redirect loops",
                self.home_path,
                role.as_str()
            ));
        }
        Ok(())
    }
}

/// Access class of a destination path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Reachable by anyone
    Public,
    /// Reachable with a guest session or an identity
    GuestOrIdentity,
    /// Reachable only with an identity
    IdentityOnly,
    /// Reachable only with an identity whose profile role admits it
    RoleOnly(Role),
}

/// Compiled route policy
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    public_exact: HashSet<String>,
    public_prefixes: Vec<String>,
    identity_exact: HashSet<String>,
    identity_prefixes: Vec<String>,
    role_routes: Vec<(String, Role)>,
    anonymous_entry: String,
    auth_required: String,
    home: String,
}

impl RoutePolicy {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            public_exact: config.public_paths.iter().map(|p| normalize_path(p)).collect(),
            public_prefixes: config
                .public_prefixes
                .iter()
                .map(|p| normalize_path(p))
                .collect(),
            identity_exact: config
                .identity_required_paths
                .iter()
                .map(|p| normalize_path(p))
                .collect(),
            identity_prefixes: config
                .identity_required_prefixes
                .iter()
                .map(|p| normalize_path(p))
                .collect(),
            role_routes: config
                .role_routes
                .iter()
                .map(|route| (normalize_path(&route.prefix), route.role))
                .collect(),
            anonymous_entry: normalize_path(&config.anonymous_entry_path),
            auth_required: normalize_path(&config.auth_required_path),
            home: normalize_path(&config.home_path),
        }
    }

    /// Classify a path. Public wins over role-restricted, which wins over
    /// identity-required.
    pub fn classify(&self, path: &str) -> RouteAccess {
        let path = normalize_path(path);
        if self.public_exact.contains(&path)
            || self.public_prefixes.iter().any(|p| prefix_matches(p, &path))
        {
            return RouteAccess::Public;
        }
        if let Some((_, role)) = self
            .role_routes
            .iter()
            .find(|(prefix, _)| prefix_matches(prefix, &path))
        {
            return RouteAccess::RoleOnly(*role);
        }
        if self.identity_exact.contains(&path)
            || self.identity_prefixes.iter().any(|p| prefix_matches(p, &path))
        {
            return RouteAccess::IdentityOnly;
        }
        RouteAccess::GuestOrIdentity
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.classify(path) == RouteAccess::Public
    }

    pub fn anonymous_entry_path(&self) -> &str {
        &self.anonymous_entry
    }

    pub fn auth_required_path(&self) -> &str {
        &self.auth_required
    }

    pub fn home_path(&self) -> &str {
        &self.home
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

/// Strip query string and fragment, collapse repeated `/`, ensure a
/// leading `/` and drop a trailing one.
pub fn normalize_path(path: &str) -> String {
    let (path, _) = split_suffix(path.trim());
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Where to send the viewer back after authentication: the normalized path
/// with the original query string and fragment.
///
/// Normalizing keeps the target on this origin (`//host/x` becomes `/host/x`).
pub fn return_target(requested: &str) -> String {
    let (_, suffix) = split_suffix(requested.trim());
    format!("{}{}", normalize_path(requested), suffix)
}

fn split_suffix(path: &str) -> (&str, &str) {
    let end = path.find(|c: char| c == '?' || c == '#').unwrap_or(path.len());
    path.split_at(end)
}

/// Prefix match on segment boundaries: `/auth` matches `/auth/callback`, not `/authors`.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
