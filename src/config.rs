use std::collections::HashMap;
use std::sync::Arc;

use crate::lifecycle::TouchPolicy;
use crate::secret::{SecretResolver, SigningSecret, FALLBACK_SECRET_KEYS, PRIMARY_SECRET_KEY};
use crate::token::{
    TokenOptions, DEFAULT_DISPLAY_PREFIX_LEN, DEFAULT_RANDOM_BYTES, DEFAULT_TOKEN_PREFIX,
};

/// Last-resort secret for local development. Never injected in production.
pub const DEV_DEFAULT_SECRET: &str = "teamkeys-insecure-dev-secret";

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub admin_key: Option<String>,
    pub production: bool,
    /// Name looked up first when resolving the signing secret.
    /// Set via TEAMKEYS_SECRET_KEY_NAME. Default: API_KEY_SECRET.
    pub secret_key_name: String,
    /// Comma-separated names tried in order after the primary.
    /// Set via TEAMKEYS_SECRET_FALLBACKS. Default: AUTH_JWT_SECRET,AUTH_SECRET.
    pub secret_fallbacks: Vec<String>,
    pub token: TokenOptions,
    /// Set via TEAMKEYS_TOUCH_POLICY (best_effort | strict).
    pub touch_policy: TouchPolicy,
    settings: Arc<HashMap<String, String>>,
}

impl Config {
    /// Resolver inputs for the signing secret, over the settings snapshot.
    pub fn signing_secret(&self) -> SigningSecret {
        let default = (!self.production).then(|| DEV_DEFAULT_SECRET.to_string());
        SecretResolver::new(self.settings.clone())
            .with_primary(self.secret_key_name.clone())
            .with_fallbacks(self.secret_fallbacks.clone())
            .with_default(default)
            .into()
    }
}

// The settings snapshot holds secrets; keep it out of Debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("production", &self.production)
            .field("secret_key_name", &self.secret_key_name)
            .field("secret_fallbacks", &self.secret_fallbacks)
            .field("token", &self.token)
            .field("touch_policy", &self.touch_policy)
            .finish_non_exhaustive()
    }
}

/// Load configuration from the process environment (and `.env`, if present).
/// The environment is read once here; nothing downstream reads it again.
pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    let snapshot: HashMap<String, String> = std::env::vars().collect();
    from_map(snapshot)
}

/// Parse `raw` when set, else `default`. A set but malformed value is an error.
fn parse_or<T: std::str::FromStr>(name: &str, raw: Option<&str>, default: T) -> anyhow::Result<T> {
    match raw {
        Some(v) => v
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer, got '{}'", name, v)),
        None => Ok(default),
    }
}

/// Build configuration from an arbitrary key/value mapping.
pub fn from_map(settings: HashMap<String, String>) -> anyhow::Result<Config> {
    let get = |k: &str| settings.get(k).map(|v| v.trim()).filter(|v| !v.is_empty());

    let production = get("TEAMKEYS_ENV")
        .or_else(|| get("RUST_ENV"))
        .is_some_and(|m| m == "production");

    let touch_policy = match get("TEAMKEYS_TOUCH_POLICY") {
        Some(raw) => TouchPolicy::parse(raw)
            .ok_or_else(|| anyhow::anyhow!("TEAMKEYS_TOUCH_POLICY must be best_effort or strict, got '{}'", raw))?,
        None => TouchPolicy::default(),
    };

    let token = TokenOptions {
        prefix: get("TEAMKEYS_TOKEN_PREFIX")
            .unwrap_or(DEFAULT_TOKEN_PREFIX)
            .to_string(),
        random_bytes: parse_or(
            "TEAMKEYS_TOKEN_BYTES",
            get("TEAMKEYS_TOKEN_BYTES"),
            DEFAULT_RANDOM_BYTES,
        )?,
        display_prefix_len: parse_or(
            "TEAMKEYS_DISPLAY_PREFIX_LEN",
            get("TEAMKEYS_DISPLAY_PREFIX_LEN"),
            DEFAULT_DISPLAY_PREFIX_LEN,
        )?,
    };
    if token.random_bytes < 16 {
        anyhow::bail!("TEAMKEYS_TOKEN_BYTES must be at least 16");
    }

    let secret_fallbacks = match get("TEAMKEYS_SECRET_FALLBACKS") {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        None => FALLBACK_SECRET_KEYS.iter().map(|s| s.to_string()).collect(),
    };

    let cfg = Config {
        port: parse_or("TEAMKEYS_PORT", get("TEAMKEYS_PORT"), 8443)?,
        database_url: get("DATABASE_URL")
            .unwrap_or("postgres://localhost/teamkeys")
            .to_string(),
        admin_key: get("TEAMKEYS_ADMIN_KEY").map(String::from),
        production,
        secret_key_name: get("TEAMKEYS_SECRET_KEY_NAME")
            .unwrap_or(PRIMARY_SECRET_KEY)
            .to_string(),
        secret_fallbacks,
        token,
        touch_policy,
        settings: Arc::new(settings.clone()),
    };

    if cfg.signing_secret().material().is_err() {
        anyhow::bail!(
            "{} is not set (nor any of {:?}). Set a signing secret before running in production.",
            cfg.secret_key_name,
            cfg.secret_fallbacks
        );
    }
    if !cfg.production && cfg.signing_secret().material().ok().as_deref() == Some(DEV_DEFAULT_SECRET) {
        tracing::warn!(
            "{} is not set, using the insecure development secret",
            cfg.secret_key_name
        );
    }

    Ok(cfg)
}
