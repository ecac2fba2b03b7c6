//! SQL statement text and schema bootstrap.
//!
//! Every statement is a template over a `{table}` placeholder; the
//! configured table name is substituted once, when the store is built.
//! Attribute rows live in a companion `{table}_ATTRIBUTES` table.

use rusqlite::Connection;

use crate::config::StoreConfig;
use crate::error::Result;

const CREATE_SESSION: &str = "INSERT INTO {table} \
    (SESSION_ID1, SESSION_ID2, CREATION_TIME, LAST_ACCESS_TIME, MAX_INACTIVE_INTERVAL, EXPIRY_TIME, PRINCIPAL_NAME) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const CREATE_ATTRIBUTE: &str = "INSERT INTO {table}_ATTRIBUTES \
    (SESSION_ID1, SESSION_ID2, ATTRIBUTE_NAME, ATTRIBUTE_BYTES) \
    VALUES (?1, ?2, ?3, ?4)";

const GET_SESSION: &str = "SELECT S.SESSION_ID1, S.SESSION_ID2, S.CREATION_TIME, S.LAST_ACCESS_TIME, S.MAX_INACTIVE_INTERVAL, \
    SA.ATTRIBUTE_NAME, SA.ATTRIBUTE_BYTES \
    FROM {table} S \
    LEFT OUTER JOIN {table}_ATTRIBUTES SA \
    ON S.SESSION_ID1 = SA.SESSION_ID1 AND S.SESSION_ID2 = SA.SESSION_ID2 \
    WHERE S.SESSION_ID1 = ?1 AND S.SESSION_ID2 = ?2";

const UPDATE_SESSION: &str = "UPDATE {table} \
    SET SESSION_ID1 = ?1, SESSION_ID2 = ?2, LAST_ACCESS_TIME = ?3, MAX_INACTIVE_INTERVAL = ?4, EXPIRY_TIME = ?5, PRINCIPAL_NAME = ?6 \
    WHERE SESSION_ID1 = ?7 AND SESSION_ID2 = ?8";

const UPDATE_ATTRIBUTE: &str = "UPDATE {table}_ATTRIBUTES \
    SET ATTRIBUTE_BYTES = ?1 \
    WHERE SESSION_ID1 = ?2 AND SESSION_ID2 = ?3 AND ATTRIBUTE_NAME = ?4";

const DELETE_ATTRIBUTE: &str = "DELETE FROM {table}_ATTRIBUTES \
    WHERE SESSION_ID1 = ?1 AND SESSION_ID2 = ?2 AND ATTRIBUTE_NAME = ?3";

const DELETE_SESSION: &str = "DELETE FROM {table} \
    WHERE SESSION_ID1 = ?1 AND SESSION_ID2 = ?2";

// Ordered by primary key so rows for one session are contiguous for the
// single-pass assembler.
const LIST_BY_PRINCIPAL: &str = "SELECT S.SESSION_ID1, S.SESSION_ID2, S.CREATION_TIME, S.LAST_ACCESS_TIME, S.MAX_INACTIVE_INTERVAL, \
    SA.ATTRIBUTE_NAME, SA.ATTRIBUTE_BYTES \
    FROM {table} S \
    LEFT OUTER JOIN {table}_ATTRIBUTES SA \
    ON S.SESSION_ID1 = SA.SESSION_ID1 AND S.SESSION_ID2 = SA.SESSION_ID2 \
    WHERE S.PRINCIPAL_NAME = ?1 \
    ORDER BY S.SESSION_ID1, S.SESSION_ID2";

const DELETE_BY_EXPIRY: &str = "DELETE FROM {table} WHERE EXPIRY_TIME < ?1";

/// Statement text expanded for one table prefix.
#[derive(Debug, Clone)]
pub(crate) struct Statements {
    pub create_session: String,
    pub create_attribute: String,
    pub get_session: String,
    pub update_session: String,
    pub update_attribute: String,
    pub delete_attribute: String,
    pub delete_session: String,
    pub list_by_principal: String,
    pub delete_by_expiry: String,
}

impl Statements {
    pub fn prepare(config: &StoreConfig) -> Self {
        let expand = |template: &str| template.replace("{table}", &config.table_name);
        Self {
            create_session: expand(CREATE_SESSION),
            create_attribute: expand(CREATE_ATTRIBUTE),
            get_session: expand(GET_SESSION),
            update_session: expand(UPDATE_SESSION),
            update_attribute: expand(UPDATE_ATTRIBUTE),
            delete_attribute: expand(DELETE_ATTRIBUTE),
            delete_session: expand(DELETE_SESSION),
            list_by_principal: expand(LIST_BY_PRINCIPAL),
            delete_by_expiry: expand(DELETE_BY_EXPIRY),
        }
    }
}

/// Create both tables and their indexes if missing.
///
/// Expiry times and access times are epoch milliseconds, the inactive
/// interval is whole seconds. Attribute rows cascade on session delete.
pub(crate) fn ensure_schema(conn: &Connection, table_name: &str) -> Result<()> {
    let ddl = r#"
        CREATE TABLE IF NOT EXISTS {table} (
            SESSION_ID1 INTEGER NOT NULL,
            SESSION_ID2 INTEGER NOT NULL,
            CREATION_TIME INTEGER NOT NULL,
            LAST_ACCESS_TIME INTEGER NOT NULL,
            MAX_INACTIVE_INTERVAL INTEGER NOT NULL,
            EXPIRY_TIME INTEGER NOT NULL,
            PRINCIPAL_NAME TEXT,
            PRIMARY KEY (SESSION_ID1, SESSION_ID2)
        );

        CREATE INDEX IF NOT EXISTS IDX_{table}_PRINCIPAL
            ON {table} (PRINCIPAL_NAME);

        CREATE INDEX IF NOT EXISTS IDX_{table}_EXPIRY
            ON {table} (EXPIRY_TIME);

        CREATE TABLE IF NOT EXISTS {table}_ATTRIBUTES (
            SESSION_ID1 INTEGER NOT NULL,
            SESSION_ID2 INTEGER NOT NULL,
            ATTRIBUTE_NAME TEXT NOT NULL,
            ATTRIBUTE_BYTES BLOB NOT NULL,
            PRIMARY KEY (SESSION_ID1, SESSION_ID2, ATTRIBUTE_NAME),
            FOREIGN KEY (SESSION_ID1, SESSION_ID2)
                REFERENCES {table} (SESSION_ID1, SESSION_ID2)
                ON DELETE CASCADE
        );
    "#
    .replace("{table}", table_name);

    conn.execute_batch(&ddl)?;
    Ok(())
}
