//! Token generation, validation, and rotation.
//!
//! - [`keys`] - HMAC signing keys and the key ring used for secret rotation
//! - [`claims`] - Claims carried by access and refresh tokens
//! - [`jwt`] - Encoding and verifying signed tokens
//! - [`service`] - Issuing pairs, refresh rotation, logout, authentication

pub mod claims;
pub mod jwt;
pub mod keys;
pub mod service;

pub use claims::{TokenClaims, TokenType};
pub use jwt::{JwtCodec, JwtError};
pub use keys::{KeyRing, SigningAlgorithm, SigningKey};
pub use service::{TokenConfig, TokenService};
