//! Token generation and keyed hashing.
//!
//! `generate` and `verify` both go through [`hash`], so a digest computed at
//! creation is always reproducible from the presented token.

use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::errors::KeyError;
use crate::models::PlaintextToken;
use crate::secret::SigningSecret;

pub const DEFAULT_TOKEN_PREFIX: &str = "ak_";
pub const DEFAULT_RANDOM_BYTES: usize = 32;
pub const DEFAULT_DISPLAY_PREFIX_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOptions {
    pub prefix: String,
    pub random_bytes: usize,
    pub display_prefix_len: usize,
}

impl Default for TokenOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_TOKEN_PREFIX.to_string(),
            random_bytes: DEFAULT_RANDOM_BYTES,
            display_prefix_len: DEFAULT_DISPLAY_PREFIX_LEN,
        }
    }
}

#[derive(Debug)]
pub struct GeneratedToken {
    pub token: PlaintextToken,
    pub token_hash: String,
    pub token_prefix: String,
}

/// Hex HMAC-SHA256 of `token` keyed with `secret`.
pub fn hash_with_secret(secret: &str, token: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Digest of a presented token under the resolved secret.
pub fn hash(token: &str, secret: &SigningSecret) -> Result<String, KeyError> {
    let material = zeroize::Zeroizing::new(secret.material()?);
    Ok(hash_with_secret(&material, token))
}

/// Draw a fresh token and derive its digest and display prefix.
pub fn generate(opts: &TokenOptions, secret: &SigningSecret) -> Result<GeneratedToken, KeyError> {
    // Resolve first so a missing secret costs no entropy.
    let material = zeroize::Zeroizing::new(secret.material()?);

    let mut bytes = zeroize::Zeroizing::new(vec![0u8; opts.random_bytes]);
    OsRng.fill_bytes(bytes.as_mut_slice());
    let token = format!(
        "{}{}",
        opts.prefix,
        general_purpose::URL_SAFE_NO_PAD.encode(bytes.as_slice())
    );

    let token_hash = hash_with_secret(&material, &token);
    let token_prefix: String = token.chars().take(opts.display_prefix_len).collect();

    Ok(GeneratedToken {
        token: PlaintextToken::new(token),
        token_hash,
        token_prefix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SigningSecret {
        SigningSecret::from(s)
    }

    #[test]
    fn test_generate_shape() {
        let opts = TokenOptions::default();
        let g = generate(&opts, &secret("s")).unwrap();

        assert!(g.token.expose().starts_with("ak_"));
        assert_eq!(g.token_hash.len(), 64);
        assert!(g.token_hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(g.token_prefix.chars().count(), 12);
        assert!(g.token.expose().starts_with(&g.token_prefix));
    }

    #[test]
    fn test_token_body_is_url_safe() {
        let g = generate(&TokenOptions::default(), &secret("s")).unwrap();
        let body = &g.token.expose()[3..];
        // 32 bytes -> 43 chars without padding
        assert_eq!(body.len(), 43);
        assert!(body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_hash_is_deterministic_and_matches_generate() {
        let s = secret("s");
        let g = generate(&TokenOptions::default(), &s).unwrap();
        let h1 = hash(g.token.expose(), &s).unwrap();
        let h2 = hash(g.token.expose(), &s).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1, g.token_hash);
    }

    #[test]
    fn test_hash_depends_on_secret() {
        assert_ne!(hash_with_secret("a", "ak_x"), hash_with_secret("b", "ak_x"));
    }

    #[test]
    fn test_single_char_change_never_matches() {
        let s = secret("s");
        let g = generate(&TokenOptions::default(), &s).unwrap();
        let token = g.token.expose();

        for i in 0..token.len() {
            let mut chars: Vec<char> = token.chars().collect();
            chars[i] = if chars[i] == 'A' { 'B' } else { 'A' };
            let tampered: String = chars.into_iter().collect();
            assert_ne!(hash(&tampered, &s).unwrap(), g.token_hash, "position {i}");
        }
    }

    #[test]
    fn test_custom_options() {
        let opts = TokenOptions {
            prefix: "tk_live_".into(),
            random_bytes: 16,
            display_prefix_len: 4,
        };
        let g = generate(&opts, &secret("s")).unwrap();
        assert!(g.token.expose().starts_with("tk_live_"));
        assert_eq!(g.token_prefix, "tk_l");
    }

    #[test]
    fn test_tokens_are_unique() {
        let s = secret("s");
        let a = generate(&TokenOptions::default(), &s).unwrap();
        let b = generate(&TokenOptions::default(), &s).unwrap();
        assert_ne!(a.token.expose(), b.token.expose());
        assert_ne!(a.token_hash, b.token_hash);
    }

    #[test]
    fn test_missing_secret() {
        let err = generate(&TokenOptions::default(), &SigningSecret::Plain(String::new())).unwrap_err();
        assert!(matches!(err, KeyError::SecretRequired));
        let err = hash("ak_x", &SigningSecret::Plain(" ".into())).unwrap_err();
        assert!(matches!(err, KeyError::SecretRequired));
    }
}
