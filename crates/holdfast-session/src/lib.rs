//! Session domain types for Holdfast.
//!
//! This crate provides the in-memory representation of a web session:
//! - A composite 128-bit identifier stored as two signed 64-bit halves
//! - The [`Session`] entity with per-attribute change tracking, so a
//!   persistence layer can write back only what actually changed
//! - Principal-name resolution from session attributes, used as the
//!   secondary lookup index
//!
//! Persistence itself lives in the companion `holdfast-store` crate; this
//! crate has no storage dependencies.

mod error;
mod id;
mod principal;
mod session;

pub use error::{Result, SessionError};
pub use id::SessionId;
pub use principal::{
    DefaultPrincipalResolver, PRINCIPAL_NAME_INDEX, PrincipalResolver, SECURITY_CONTEXT_ATTRIBUTE,
};
pub use session::{AttributeChange, DEFAULT_MAX_INACTIVE_SECS, Session};
