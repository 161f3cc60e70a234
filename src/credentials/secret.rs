//! In-memory secret handles.

use chrono::{DateTime, Utc};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// A plaintext secret that is zeroed when dropped or explicitly disposed.
///
/// `Debug` and `Display` never reveal the value.
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: String) -> Self {
        Self(Zeroizing::new(value))
    }

    /// Borrow the plaintext. Callers must not copy it into unzeroed storage.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite the plaintext with zeroes now rather than at drop.
    pub fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

/// The accounts that receive a generated password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Built-in administrator; the build engine logs in with it.
    Administrator,
    /// Unprivileged account consumers use; embedded in the box descriptor.
    User,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Administrator, Role::User];

    /// Literal token the descriptor template must contain exactly once.
    pub fn placeholder(self) -> &'static str {
        match self {
            Role::Administrator => "{{ADMIN_PASSWORD}}",
            Role::User => "{{USER_PASSWORD}}",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Role::Administrator => "Built-in administrator account",
            Role::User => "Automation account used by the packaged box",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated password bound to a role.
#[derive(Debug)]
pub struct Credential {
    pub role: Role,
    pub secret: Secret,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts() {
        let secret = Secret::new("correct-horse-battery".to_string());
        assert_eq!(format!("{:?}", secret), "Secret(***)");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(secret.expose(), "correct-horse-battery");
    }

    #[test]
    fn test_zeroize_clears_value() {
        let mut secret = Secret::new("staple".to_string());
        secret.zeroize();
        assert!(secret.is_empty());
    }

    #[test]
    fn test_placeholders_are_distinct() {
        assert_ne!(Role::Administrator.placeholder(), Role::User.placeholder());
    }
}
