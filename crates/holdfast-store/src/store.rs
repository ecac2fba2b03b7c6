//! Session store backed by SQLite.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info};

use holdfast_session::{
    AttributeChange, DefaultPrincipalResolver, PRINCIPAL_NAME_INDEX, PrincipalResolver, Session,
    SessionId,
};

use crate::assembler::assemble_sessions;
use crate::codec::{AttributeCodec, JsonCodec};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::sql::{Statements, ensure_schema};

/// Session store backed by SQLite.
///
/// Every operation that touches storage runs inside its own transaction on
/// the store's connection, so a failure midway leaves no partial
/// session/attribute state and a caller's ambient transaction is never
/// involved. Saves write only what the entity's delta and change flags say
/// has changed.
///
/// Concurrent saves to the same session id are last-writer-wins; there is
/// no optimistic-concurrency token.
pub struct SessionStore {
    /// The SQLite connection (wrapped in Mutex for thread safety).
    conn: Mutex<Connection>,
    config: StoreConfig,
    statements: Statements,
    codec: Box<dyn AttributeCodec>,
    resolver: Box<dyn PrincipalResolver>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("table_name", &self.config.table_name)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Initialization
// ─────────────────────────────────────────────────────────────────────────────

impl SessionStore {
    /// Open or create a session store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Open or create a session store at the given path with configuration.
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|_| {
                    StoreError::Database(rusqlite::Error::InvalidPath(path.to_path_buf()))
                })?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;

        let store = Self::from_connection(conn, config)?;
        info!("Session store opened at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_config(StoreConfig::default())
    }

    /// Create an in-memory store with configuration.
    pub fn open_in_memory_with_config(config: StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self::from_connection(conn, config)?;
        info!("In-memory session store created");
        Ok(store)
    }

    fn from_connection(conn: Connection, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let statements = Statements::prepare(&config);

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        ensure_schema(&conn, &config.table_name)?;

        Ok(Self {
            conn: Mutex::new(conn),
            config,
            statements,
            codec: Box::new(JsonCodec),
            resolver: Box::new(DefaultPrincipalResolver),
        })
    }

    /// Replace the attribute codec.
    pub fn with_codec(mut self, codec: impl AttributeCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Replace the principal-name resolution strategy.
    pub fn with_principal_resolver(mut self, resolver: impl PrincipalResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────────

impl SessionStore {
    /// Execute a function within a transaction.
    ///
    /// All operations within the closure are executed atomically. If the
    /// closure returns an error, all changes are rolled back and the error
    /// is propagated unchanged.
    fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        match f(&tx) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                // Transaction is rolled back when dropped
                Err(e)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Operations
// ─────────────────────────────────────────────────────────────────────────────

impl SessionStore {
    /// Create a new, unsaved session with the configured default interval.
    pub fn create_session(&self) -> Session {
        let mut session = Session::new();
        session.set_max_inactive_interval(self.config.default_max_inactive_interval);
        session
    }

    /// Persist a session, writing only what changed since the last save.
    ///
    /// A new session inserts the session row plus one row per attribute in
    /// a single transaction. An existing session rewrites the metadata row
    /// only when the entity is marked changed (keyed by the previous id
    /// when a rotation is pending) and applies the attribute delta row by
    /// row: tombstones delete, values update, and an update that matches
    /// nothing falls back to an insert. Change flags are cleared once the
    /// transaction has committed.
    pub fn save(&self, session: &mut Session) -> Result<()> {
        if session.is_new() {
            self.insert_session(session)?;
        } else {
            self.update_session(session)?;
        }
        session.clear_change_flags();
        Ok(())
    }

    fn insert_session(&self, session: &Session) -> Result<()> {
        let (id_hi, id_lo) = session.id().halves();
        let principal = self.resolver.resolve(session.attributes());

        self.with_transaction(|conn| {
            conn.execute(
                &self.statements.create_session,
                params![
                    id_hi,
                    id_lo,
                    session.creation_time().timestamp_millis(),
                    session.last_accessed_time().timestamp_millis(),
                    session.max_inactive_interval().num_seconds(),
                    session.expiry_time().timestamp_millis(),
                    principal,
                ],
            )?;

            if session.attributes().is_empty() {
                return Ok(());
            }

            let mut stmt = conn.prepare(&self.statements.create_attribute)?;
            for (name, value) in session.attributes() {
                let bytes = self.codec.serialize(value)?;
                stmt.execute(params![id_hi, id_lo, name, bytes])?;
            }
            Ok(())
        })?;

        debug!("Inserted session {}", session.id());
        Ok(())
    }

    fn update_session(&self, session: &mut Session) -> Result<()> {
        let (id_hi, id_lo) = session.id().halves();
        let principal = self.resolver.resolve(session.attributes());

        self.with_transaction(|conn| {
            if session.is_changed() {
                // A pending rotation keys the rewrite by the id the row
                // still carries in storage.
                let (key_hi, key_lo) = session.previous_id().unwrap_or(session.id()).halves();
                conn.execute(
                    &self.statements.update_session,
                    params![
                        id_hi,
                        id_lo,
                        session.last_accessed_time().timestamp_millis(),
                        session.max_inactive_interval().num_seconds(),
                        session.expiry_time().timestamp_millis(),
                        principal,
                        key_hi,
                        key_lo,
                    ],
                )?;
            }

            for (name, change) in session.delta() {
                match change {
                    AttributeChange::Removed => {
                        conn.execute(
                            &self.statements.delete_attribute,
                            params![id_hi, id_lo, name],
                        )?;
                    }
                    AttributeChange::Set(value) => {
                        let bytes = self.codec.serialize(value)?;
                        let updated = conn.execute(
                            &self.statements.update_attribute,
                            params![bytes, id_hi, id_lo, name],
                        )?;
                        if updated == 0 {
                            conn.execute(
                                &self.statements.create_attribute,
                                params![id_hi, id_lo, name, bytes],
                            )?;
                        }
                    }
                }
            }
            Ok(())
        })?;

        session.clear_previous_id();
        debug!("Updated session {}", session.id());
        Ok(())
    }

    /// Look up a session by its textual identifier.
    ///
    /// Returns `Ok(None)` when no such session exists. An expired session
    /// is deleted as a side effect and reported as absent; expiry is
    /// enforced here as well as by the bulk sweep.
    pub fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
        let id: SessionId = id.parse()?;
        self.find_by_session_id(id)
    }

    fn find_by_session_id(&self, id: SessionId) -> Result<Option<Session>> {
        let (id_hi, id_lo) = id.halves();

        let session = self.with_transaction(|conn| {
            let mut stmt = conn.prepare(&self.statements.get_session)?;
            let mut rows = stmt.query(params![id_hi, id_lo])?;
            let mut sessions = assemble_sessions(&mut rows, self.codec.as_ref())?;
            if sessions.is_empty() {
                Ok(None)
            } else {
                Ok(Some(sessions.remove(0)))
            }
        })?;

        match session {
            Some(session) if session.is_expired() => {
                debug!("Session {} is expired, deleting", id);
                self.delete_by_session_id(id)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Delete a session and its attribute rows by textual identifier.
    pub fn delete_by_id(&self, id: &str) -> Result<()> {
        let id: SessionId = id.parse()?;
        self.delete_by_session_id(id)
    }

    fn delete_by_session_id(&self, id: SessionId) -> Result<()> {
        let (id_hi, id_lo) = id.halves();

        self.with_transaction(|conn| {
            conn.execute(&self.statements.delete_session, params![id_hi, id_lo])?;
            Ok(())
        })?;

        debug!("Deleted session {}", id);
        Ok(())
    }

    /// Look up sessions by secondary index, keyed by textual id.
    ///
    /// Only the principal-name index ([`PRINCIPAL_NAME_INDEX`]) is
    /// supported; any other index name yields an empty map, not an error.
    pub fn find_by_index_name_and_value(
        &self,
        index_name: &str,
        index_value: &str,
    ) -> Result<HashMap<String, Session>> {
        if index_name != PRINCIPAL_NAME_INDEX {
            return Ok(HashMap::new());
        }

        let sessions = self.with_transaction(|conn| {
            let mut stmt = conn.prepare(&self.statements.list_by_principal)?;
            let mut rows = stmt.query(params![index_value])?;
            assemble_sessions(&mut rows, self.codec.as_ref())
        })?;

        Ok(sessions
            .into_iter()
            .map(|session| (session.id().to_string(), session))
            .collect())
    }

    /// Delete every session whose stored expiry time has passed.
    ///
    /// Attribute rows cascade with their session. Returns the number of
    /// sessions removed; zero matches is a normal outcome.
    pub fn clean_up_expired_sessions(&self) -> Result<usize> {
        let now = Utc::now().timestamp_millis();

        let deleted = self.with_transaction(|conn| {
            Ok(conn.execute(&self.statements.delete_by_expiry, params![now])?)
        })?;

        debug!("Cleaned up {} expired sessions", deleted);
        Ok(deleted)
    }
}
