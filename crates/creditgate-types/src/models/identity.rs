//! Caller identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who is asking for generation credits.
///
/// Derived fresh per request from session/cookie state; only the opaque
/// [`CallerIdentity::identity_key`] is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallerIdentity {
    /// Unauthenticated caller tracked through a client-held usage token
    Guest {
        /// Raw usage token from the cookie, if the client sent one
        cookie_token: Option<String>,
    },
    /// Signed-in caller tracked through a server-side usage record
    Authenticated {
        /// Account identifier issued by the authentication layer
        user_id: String,
    },
}

/// Discriminant of [`CallerIdentity`], used for labels and limiter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    Guest,
    Authenticated,
}

impl IdentityKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CallerIdentity {
    pub fn guest(cookie_token: Option<String>) -> Self {
        Self::Guest { cookie_token }
    }

    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self::Authenticated { user_id: user_id.into() }
    }

    pub const fn kind(&self) -> IdentityKind {
        match self {
            Self::Guest { .. } => IdentityKind::Guest,
            Self::Authenticated { .. } => IdentityKind::Authenticated,
        }
    }

    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Opaque key for the server-side usage record.
    ///
    /// Guests have no server-side record, so this is `None` for them.
    pub fn identity_key(&self) -> Option<String> {
        match self {
            Self::Guest { .. } => None,
            Self::Authenticated { user_id } => Some(Self::user_key(user_id)),
        }
    }

    /// Storage key for an authenticated account id.
    pub fn user_key(user_id: &str) -> String {
        format!("user:{user_id}")
    }

    /// Label safe for logs (never includes the guest token).
    pub fn log_label(&self) -> String {
        match self {
            Self::Guest { .. } => "guest".to_string(),
            Self::Authenticated { user_id } => format!("user:{user_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key() {
        assert_eq!(CallerIdentity::authenticated("42").identity_key().as_deref(), Some("user:42"));
        assert_eq!(CallerIdentity::guest(Some("tok".to_string())).identity_key(), None);
    }

    #[test]
    fn test_log_label_hides_guest_token() {
        let guest = CallerIdentity::guest(Some("secret-token".to_string()));
        assert!(!guest.log_label().contains("secret"));
    }
}
