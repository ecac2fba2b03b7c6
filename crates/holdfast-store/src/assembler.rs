//! Reconstruction of session entities from flat joined rows.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Rows;

use holdfast_session::{Session, SessionId};

use crate::codec::AttributeCodec;
use crate::error::{Result, StoreError};

/// Rebuild sessions from rows of the session/attribute outer join.
///
/// Rows must be ordered so that all rows for one session arrive
/// contiguously; assembly is a single forward pass comparing each row's key
/// against the most recently built entity, never a hash-based grouping. A
/// session with no attributes arrives as exactly one row with null
/// attribute columns. The returned order matches the query's row order.
pub(crate) fn assemble_sessions(
    rows: &mut Rows<'_>,
    codec: &dyn AttributeCodec,
) -> Result<Vec<Session>> {
    let mut sessions: Vec<Session> = Vec::new();

    while let Some(row) = rows.next()? {
        let id = SessionId::from_halves(row.get(0)?, row.get(1)?);

        if sessions.last().map(|session| session.id()) != Some(id) {
            let creation_time = millis_to_datetime(row.get(2)?)?;
            let last_accessed_time = millis_to_datetime(row.get(3)?)?;
            let max_inactive_interval = Duration::seconds(row.get(4)?);
            sessions.push(Session::restored(
                id,
                creation_time,
                last_accessed_time,
                max_inactive_interval,
            ));
        }

        let attribute_name: Option<String> = row.get(5)?;
        if let Some(name) = attribute_name {
            let bytes: Vec<u8> = row.get(6)?;
            let value = codec.deserialize(&bytes)?;
            if let Some(session) = sessions.last_mut() {
                session.restore_attribute(name, value);
            }
        }
    }

    Ok(sessions)
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::InvalidData(format!("timestamp out of range: {millis}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::{Connection, params};
    use serde_json::json;

    use crate::codec::JsonCodec;
    use crate::sql::ensure_schema;

    const TABLE: &str = "HOLDFAST_SESSION";

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn, TABLE).unwrap();
        conn
    }

    fn insert_session(conn: &Connection, id: SessionId, principal: Option<&str>) {
        let (hi, lo) = id.halves();
        conn.execute(
            "INSERT INTO HOLDFAST_SESSION \
             (SESSION_ID1, SESSION_ID2, CREATION_TIME, LAST_ACCESS_TIME, MAX_INACTIVE_INTERVAL, EXPIRY_TIME, PRINCIPAL_NAME) \
             VALUES (?1, ?2, 1000, 2000, 1800, 1802000, ?3)",
            params![hi, lo, principal],
        )
        .unwrap();
    }

    fn insert_attribute(conn: &Connection, id: SessionId, name: &str, value: &serde_json::Value) {
        let (hi, lo) = id.halves();
        let bytes = JsonCodec.serialize(value).unwrap();
        conn.execute(
            "INSERT INTO HOLDFAST_SESSION_ATTRIBUTES \
             (SESSION_ID1, SESSION_ID2, ATTRIBUTE_NAME, ATTRIBUTE_BYTES) \
             VALUES (?1, ?2, ?3, ?4)",
            params![hi, lo, name, bytes],
        )
        .unwrap();
    }

    fn assemble_all(conn: &Connection) -> Vec<Session> {
        let mut stmt = conn
            .prepare(
                "SELECT S.SESSION_ID1, S.SESSION_ID2, S.CREATION_TIME, S.LAST_ACCESS_TIME, \
                 S.MAX_INACTIVE_INTERVAL, SA.ATTRIBUTE_NAME, SA.ATTRIBUTE_BYTES \
                 FROM HOLDFAST_SESSION S \
                 LEFT OUTER JOIN HOLDFAST_SESSION_ATTRIBUTES SA \
                 ON S.SESSION_ID1 = SA.SESSION_ID1 AND S.SESSION_ID2 = SA.SESSION_ID2 \
                 ORDER BY S.SESSION_ID1, S.SESSION_ID2",
            )
            .unwrap();
        let mut rows = stmt.query([]).unwrap();
        assemble_sessions(&mut rows, &JsonCodec).unwrap()
    }

    #[test]
    fn test_session_without_attributes_is_one_row() {
        let conn = test_conn();
        let id = SessionId::generate();
        insert_session(&conn, id, None);

        let sessions = assemble_all(&conn);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id(), id);
        assert_eq!(sessions[0].attribute_names().count(), 0);
        assert_eq!(sessions[0].creation_time().timestamp_millis(), 1000);
        assert_eq!(sessions[0].last_accessed_time().timestamp_millis(), 2000);
        assert_eq!(sessions[0].max_inactive_interval(), Duration::seconds(1800));
    }

    #[test]
    fn test_multiple_attribute_rows_collapse_into_one_entity() {
        let conn = test_conn();
        let id = SessionId::generate();
        insert_session(&conn, id, None);
        insert_attribute(&conn, id, "a", &json!(1));
        insert_attribute(&conn, id, "b", &json!("two"));
        insert_attribute(&conn, id, "c", &json!({"three": 3}));

        let sessions = assemble_all(&conn);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].attribute("a"), Some(&json!(1)));
        assert_eq!(sessions[0].attribute("b"), Some(&json!("two")));
        assert_eq!(sessions[0].attribute("c"), Some(&json!({"three": 3})));
    }

    #[test]
    fn test_adjacent_grouping_splits_distinct_sessions() {
        let conn = test_conn();
        let first = SessionId::generate();
        let second = SessionId::generate();
        insert_session(&conn, first, None);
        insert_session(&conn, second, None);
        insert_attribute(&conn, first, "who", &json!("first"));
        insert_attribute(&conn, second, "who", &json!("second"));

        let sessions = assemble_all(&conn);
        assert_eq!(sessions.len(), 2);
        for session in sessions {
            let expected = if session.id() == first { "first" } else { "second" };
            assert_eq!(session.attribute("who"), Some(&json!(expected)));
        }
    }

    #[test]
    fn test_rehydrated_sessions_are_clean() {
        let conn = test_conn();
        let id = SessionId::generate();
        insert_session(&conn, id, None);
        insert_attribute(&conn, id, "a", &json!(1));

        let sessions = assemble_all(&conn);
        assert!(!sessions[0].is_new());
        assert!(!sessions[0].is_changed());
        assert!(sessions[0].delta().is_empty());
    }
}
