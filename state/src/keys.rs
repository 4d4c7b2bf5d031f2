//! Credential resolution
//!
//! Resolves a presented API key to an access level. Comparison is plain
//! string equality against the configured key set.

use ephemera_core::{EphemeraError, KeyConfig};
use std::collections::HashSet;

/// Capability granted to an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Full read/write/delete authority
    Master,
    /// Read and status access only
    ReadOnly,
}

impl Access {
    pub fn can_write(&self) -> bool {
        matches!(self, Access::Master)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Access::ReadOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Master => "master",
            Access::ReadOnly => "read-only",
        }
    }
}

/// Why a credential was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    Invalid,
    InsufficientPermissions,
}

impl AuthFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            AuthFailure::Missing => "missing",
            AuthFailure::Invalid => "invalid",
            AuthFailure::InsufficientPermissions => "insufficient-permissions",
        }
    }
}

impl From<AuthFailure> for EphemeraError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Missing => EphemeraError::MissingCredential,
            AuthFailure::Invalid => EphemeraError::InvalidCredential,
            AuthFailure::InsufficientPermissions => EphemeraError::master_key_required(),
        }
    }
}

/// Result of authenticating a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    AuthenticatedMaster,
    AuthenticatedReadOnly,
    Unauthenticated(AuthFailure),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthOutcome::Unauthenticated(_))
    }

    /// Convert into the granted capability, or the error to report
    pub fn into_access(self) -> Result<Access, EphemeraError> {
        match self {
            AuthOutcome::AuthenticatedMaster => Ok(Access::Master),
            AuthOutcome::AuthenticatedReadOnly => Ok(Access::ReadOnly),
            AuthOutcome::Unauthenticated(failure) => Err(failure.into()),
        }
    }
}

/// The configured credential set
pub struct KeyRing {
    master: String,
    read_only: HashSet<String>,
}

impl KeyRing {
    pub fn new(master: impl Into<String>, read_only: impl IntoIterator<Item = String>) -> Self {
        Self {
            master: master.into(),
            read_only: read_only.into_iter().filter(|k| !k.is_empty()).collect(),
        }
    }

    pub fn from_config(config: &KeyConfig) -> Self {
        Self::new(config.master_key.clone(), config.read_only_keys.iter().cloned())
    }

    /// Resolve `provided` against the key set.
    ///
    /// An empty key is treated as missing. The master key satisfies every
    /// requirement; a read-only key is refused when `require_master` is set.
    pub fn authenticate(&self, provided: Option<&str>, require_master: bool) -> AuthOutcome {
        let key = match provided {
            Some(key) if !key.is_empty() => key,
            _ => return AuthOutcome::Unauthenticated(AuthFailure::Missing),
        };

        if key == self.master {
            return AuthOutcome::AuthenticatedMaster;
        }

        if self.read_only.contains(key) {
            if require_master {
                return AuthOutcome::Unauthenticated(AuthFailure::InsufficientPermissions);
            }
            return AuthOutcome::AuthenticatedReadOnly;
        }

        AuthOutcome::Unauthenticated(AuthFailure::Invalid)
    }

    pub fn read_only_count(&self) -> usize {
        self.read_only.len()
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("read_only_keys", &self.read_only.len())
            .finish_non_exhaustive()
    }
}
