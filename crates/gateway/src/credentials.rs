//! Configured credentials and how operators address them.
//!
//! Operators refer to a credential either by its 1-based position in the
//! configured list or by its raw value. Both forms resolve to a
//! [`CredentialId`] at the supervisor boundary; nothing past that point sees
//! raw indices.

use std::{fmt, sync::Arc};

use secrecy::{ExposeSecret, Secret};

use crate::error::{Error, Result};

// ── Identity ─────────────────────────────────────────────────────────────────

/// Internal, 0-based credential identity. Displays 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CredentialId(usize);

impl CredentialId {
    pub fn index(self) -> usize {
        self.0
    }

    /// Position as shown to operators.
    pub fn position(self) -> usize {
        self.0 + 1
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.position())
    }
}

/// How an operator names a single credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialRef {
    /// 1-based position.
    ByIndex(i64),
    ByValue(String),
}

/// Target of a supervisor operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    One(CredentialRef),
}

impl Target {
    pub fn index(position: i64) -> Self {
        Self::One(CredentialRef::ByIndex(position))
    }
}

// ── Credential ───────────────────────────────────────────────────────────────

/// A configured credential. The raw value is only reachable via [`Credential::expose`].
#[derive(Clone)]
pub struct Credential {
    id: CredentialId,
    secret: Arc<Secret<String>>,
    masked: String,
}

impl Credential {
    pub fn id(&self) -> CredentialId {
        self.id
    }

    /// Log-safe form of the credential.
    pub fn masked(&self) -> &str {
        &self.masked
    }

    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("masked", &self.masked)
            .finish()
    }
}

/// First ten characters of tokens longer than eleven characters, otherwise
/// nothing at all.
pub fn mask(token: &str) -> String {
    if token.chars().count() > 11 {
        let head: String = token.chars().take(10).collect();
        format!("{head}...")
    } else {
        "[redacted]".to_string()
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Ordered, immutable set of configured credentials.
#[derive(Debug, Clone, Default)]
pub struct CredentialRegistry {
    credentials: Vec<Credential>,
}

impl CredentialRegistry {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let credentials = tokens
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                let token = token.into();
                Credential {
                    id: CredentialId(i),
                    masked: mask(&token),
                    secret: Arc::new(Secret::new(token)),
                }
            })
            .collect();
        Self { credentials }
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn get(&self, id: CredentialId) -> Option<&Credential> {
        self.credentials.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = CredentialId> + '_ {
        self.credentials.iter().map(|c| c.id)
    }

    /// Resolve a single reference. Indices are 1-based and never clamped.
    pub fn resolve(&self, reference: &CredentialRef) -> Result<CredentialId> {
        match reference {
            CredentialRef::ByIndex(index) => {
                let count = self.len();
                usize::try_from(*index)
                    .ok()
                    .filter(|i| (1..=count).contains(i))
                    .map(|i| CredentialId(i - 1))
                    .ok_or(Error::IndexOutOfRange {
                        index: *index,
                        count,
                    })
            },
            CredentialRef::ByValue(value) => self
                .credentials
                .iter()
                .find(|c| c.expose() == value)
                .map(|c| c.id)
                .ok_or_else(|| Error::UnknownCredential(mask(value))),
        }
    }

    /// Resolve a target into the ids it covers, in configured order.
    pub fn resolve_target(&self, target: &Target) -> Result<Vec<CredentialId>> {
        match target {
            Target::All => Ok(self.ids().collect()),
            Target::One(reference) => Ok(vec![self.resolve(reference)?]),
        }
    }
}
