//! Signing secret resolution.
//!
//! The resolver never reads the process environment itself. Callers hand it
//! a key/value mapping (usually a snapshot taken once by `config::load`).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::errors::KeyError;

/// Name checked first in the configuration mapping.
pub const PRIMARY_SECRET_KEY: &str = "API_KEY_SECRET";

/// Names checked, in order, when the primary name is unset.
pub const FALLBACK_SECRET_KEYS: &[&str] = &["AUTH_JWT_SECRET", "AUTH_SECRET"];

/// Read-only key/value source of configuration values.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<&str>;
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        BTreeMap::get(self, key).map(String::as_str)
    }
}

/// Resolve a signing secret. First hit wins:
/// explicit, `primary`, each of `fallbacks` in order, `default`.
///
/// Empty or whitespace-only values are treated as unset.
pub fn resolve<C, S>(
    explicit: Option<&str>,
    source: &C,
    primary: &str,
    fallbacks: &[S],
    default: Option<&str>,
) -> Option<String>
where
    C: ConfigSource + ?Sized,
    S: AsRef<str>,
{
    explicit
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            std::iter::once(primary)
                .chain(fallbacks.iter().map(|s| s.as_ref()))
                .find_map(|name| source.get(name).filter(|v| !v.trim().is_empty()))
        })
        .or_else(|| default.filter(|s| !s.trim().is_empty()))
        .map(str::to_string)
}

/// Bundled resolver inputs, resolved on demand.
#[derive(Clone)]
pub struct SecretResolver {
    source: Arc<dyn ConfigSource>,
    primary: String,
    fallbacks: Vec<String>,
    default: Option<String>,
}

impl SecretResolver {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            primary: PRIMARY_SECRET_KEY.to_string(),
            fallbacks: FALLBACK_SECRET_KEYS.iter().map(|s| s.to_string()).collect(),
            default: None,
        }
    }

    pub fn with_primary(mut self, name: impl Into<String>) -> Self {
        self.primary = name.into();
        self
    }

    pub fn with_fallbacks(mut self, names: Vec<String>) -> Self {
        self.fallbacks = names;
        self
    }

    pub fn with_default(mut self, secret: Option<String>) -> Self {
        self.default = secret;
        self
    }

    pub fn resolve(&self, explicit: Option<&str>) -> Option<String> {
        resolve(
            explicit,
            self.source.as_ref(),
            &self.primary,
            &self.fallbacks,
            self.default.as_deref(),
        )
    }
}

impl std::fmt::Debug for SecretResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretResolver")
            .field("primary", &self.primary)
            .field("fallbacks", &self.fallbacks)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Either a plaintext secret supplied by the caller, or resolver inputs.
#[derive(Clone)]
pub enum SigningSecret {
    Plain(String),
    Resolve(SecretResolver),
}

impl SigningSecret {
    /// The secret to key the digest with, or `SecretRequired`.
    pub fn material(&self) -> Result<String, KeyError> {
        match self {
            SigningSecret::Plain(s) if !s.trim().is_empty() => Ok(s.clone()),
            SigningSecret::Plain(_) => Err(KeyError::SecretRequired),
            SigningSecret::Resolve(resolver) => {
                resolver.resolve(None).ok_or(KeyError::SecretRequired)
            }
        }
    }
}

impl From<&str> for SigningSecret {
    fn from(s: &str) -> Self {
        SigningSecret::Plain(s.to_string())
    }
}

impl From<SecretResolver> for SigningSecret {
    fn from(r: SecretResolver) -> Self {
        SigningSecret::Resolve(r)
    }
}

// Never print secret material.
impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningSecret::Plain(_) => f.write_str("SigningSecret::Plain(****)"),
            SigningSecret::Resolve(r) => f.debug_tuple("SigningSecret::Resolve").field(r).finish(),
        }
    }
}
