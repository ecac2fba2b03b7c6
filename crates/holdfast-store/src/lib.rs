//! SQL-backed session persistence for Holdfast.
//!
//! This crate persists [`Session`] entities to a relational store (SQLite
//! via rusqlite), writing back only what changed since the last save. A
//! session occupies one metadata row plus one row per attribute, so
//! attribute updates never rewrite unrelated payloads.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  SessionStore                                                       │
//! │  - One SQLite file (or in-memory DB), WAL mode                      │
//! │  - Sessions table keyed by (SESSION_ID1, SESSION_ID2)               │
//! │  - Attributes table keyed by (SESSION_ID1, SESSION_ID2, NAME)       │
//! │  - Secondary index on the resolved principal name                   │
//! │  - One explicit transaction per operation                           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use holdfast_store::SessionStore;
//! use serde_json::json;
//!
//! let store = SessionStore::open("~/.holdfast/sessions.db")?;
//!
//! // Create and persist a session
//! let mut session = store.create_session();
//! session.set_attribute("cart", json!(["sku-1", "sku-2"]));
//! let id = session.id().to_string();
//! store.save(&mut session)?;
//!
//! // Later: look it up again; expired sessions come back as None
//! if let Some(session) = store.find_by_id(&id)? {
//!     println!("cart: {:?}", session.attribute("cart"));
//! }
//!
//! // Periodically sweep out expired sessions
//! let removed = store.clean_up_expired_sessions()?;
//! println!("removed {removed} expired sessions");
//! # Ok::<(), holdfast_store::StoreError>(())
//! ```

mod assembler;
mod codec;
mod config;
mod error;
mod sql;
mod store;

pub use codec::{AttributeCodec, JsonCodec};
pub use config::{DEFAULT_TABLE_NAME, StoreConfig};
pub use error::{Result, StoreError};
pub use store::SessionStore;

// Re-export the session domain types the store API speaks in.
pub use holdfast_session::{
    AttributeChange, DefaultPrincipalResolver, PRINCIPAL_NAME_INDEX, PrincipalResolver, Session,
    SessionError, SessionId, SECURITY_CONTEXT_ATTRIBUTE,
};
