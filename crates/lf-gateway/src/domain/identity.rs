//! Caller identity and quota bucket keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Prefix for anonymous, IP-keyed buckets
pub const GUEST_KEY_PREFIX: &str = "ip:";
/// Prefix for authenticated, user-keyed buckets
pub const USER_KEY_PREFIX: &str = "user:";

/// Privileged tiers, ordered from least to most privileged.
///
/// Unknown role strings decode as `User` so a token minted by a newer
/// service never gains privileges here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "super_admin" | "superadmin" | "super-admin" => Role::SuperAdmin,
            _ => Role::User,
        }
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User attached to a request by the soft authentication layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub role: Role,
}

/// Who is making a request. Derived per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Guest { ip: IpAddr },
    Authenticated { user_id: String, role: Role },
}

impl Identity {
    /// Build the identity for a request from its client IP and optional user
    pub fn resolve(ip: IpAddr, user: Option<&AuthenticatedUser>) -> Self {
        match user {
            Some(user) => Identity::Authenticated {
                user_id: user.user_id.clone(),
                role: user.role,
            },
            None => Identity::Guest { ip },
        }
    }

    /// Quota bucket key. Guest and user namespaces never overlap.
    pub fn quota_key(&self) -> String {
        match self {
            Identity::Guest { ip } => guest_key(*ip),
            Identity::Authenticated { user_id, .. } => user_key(user_id),
        }
    }

    /// Role of an authenticated caller, `None` for guests
    pub fn role(&self) -> Option<Role> {
        match self {
            Identity::Guest { .. } => None,
            Identity::Authenticated { role, .. } => Some(*role),
        }
    }
}

pub fn guest_key(ip: IpAddr) -> String {
    format!("{GUEST_KEY_PREFIX}{ip}")
}

pub fn user_key(user_id: &str) -> String {
    format!("{USER_KEY_PREFIX}{user_id}")
}
