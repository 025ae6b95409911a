//! Storage traits for auth-related data.

pub mod revoked_token;

pub use revoked_token::{InMemoryRevokedTokenStorage, RevocationRecord, RevokedTokenStorage};
