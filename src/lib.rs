//! teamkeys: team-scoped API keys and their lifecycle.
//!
//! The library holds the credential lifecycle and its collaborators; the
//! `teamkeys` binary wires them to HTTP and a CLI.

pub mod api;
pub mod clock;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod models;
pub mod secret;
pub mod store;
pub mod token;

pub use errors::KeyError;
pub use lifecycle::{ApiKeyService, NewKeyRequest, RevokeOutcome, TouchPolicy};
pub use secret::{SecretResolver, SigningSecret};
