pub mod api_key;
pub mod view;

pub use api_key::{ApiKey, IssuedKey, KeyStatus, NewApiKey, PlaintextToken, DEFAULT_KEY_TYPE};
pub use view::{ApiKeyView, CreatorSummary};
