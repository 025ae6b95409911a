//! Authorization decisions.
//!
//! Access control here is a single pure function over the caller's identity,
//! the requested action, the resource kind and the target's ownership. There
//! are no stored policies.

pub mod permission;

pub use permission::{AccessDecision, Action, DenyReason, PermissionEvaluator};
