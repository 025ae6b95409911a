//! Core types for authentication.

mod account;
mod identity;

pub use account::{LoginRequest, RefreshRequest, RegisterRequest, Session, UserView};
pub use identity::{Identity, Principal, TokenPair};
