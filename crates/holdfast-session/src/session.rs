//! In-memory session entity with per-attribute change tracking.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::id::SessionId;
use crate::principal::{PRINCIPAL_NAME_INDEX, SECURITY_CONTEXT_ATTRIBUTE};

/// Default maximum inactive interval in seconds (30 minutes).
pub const DEFAULT_MAX_INACTIVE_SECS: i64 = 1800;

/// A recorded change to one attribute since the last save.
///
/// `Removed` is a tombstone, distinct from the attribute simply being
/// absent: it tells the persistence layer to emit a delete.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeChange {
    /// The attribute was set to this value.
    Set(Value),
    /// The attribute was removed.
    Removed,
}

/// A server-held session: metadata, attributes, and the delta accumulated
/// since the last save.
///
/// Mutations record their effect in the delta so the persistence layer can
/// write back only what changed. Metadata mutations (last access time,
/// max inactive interval, identifier rotation) additionally mark the whole
/// entity changed, which gates the metadata-row rewrite; plain attribute
/// changes do not.
///
/// A session is not expected to be mutated concurrently; confine each
/// entity to one logical request at a time.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    previous_id: Option<SessionId>,
    creation_time: DateTime<Utc>,
    last_accessed_time: DateTime<Utc>,
    max_inactive_interval: Duration,
    attributes: HashMap<String, Value>,
    delta: HashMap<String, AttributeChange>,
    is_new: bool,
    changed: bool,
}

impl Session {
    /// Create a fresh, unsaved session with a random identifier.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::generate(),
            previous_id: None,
            creation_time: now,
            last_accessed_time: now,
            max_inactive_interval: Duration::seconds(DEFAULT_MAX_INACTIVE_SECS),
            attributes: HashMap::new(),
            delta: HashMap::new(),
            is_new: true,
            changed: false,
        }
    }

    /// Rehydrate a session from persisted state.
    ///
    /// The entity starts clean: not new, not changed, empty delta.
    /// Attributes are filled in afterwards via [`Session::restore_attribute`].
    pub fn restored(
        id: SessionId,
        creation_time: DateTime<Utc>,
        last_accessed_time: DateTime<Utc>,
        max_inactive_interval: Duration,
    ) -> Self {
        Self {
            id,
            previous_id: None,
            creation_time,
            last_accessed_time,
            max_inactive_interval,
            attributes: HashMap::new(),
            delta: HashMap::new(),
            is_new: false,
            changed: false,
        }
    }

    /// The current identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The identifier last known to the backing store, set between an
    /// identifier rotation and the save that commits the rename.
    pub fn previous_id(&self) -> Option<SessionId> {
        self.previous_id
    }

    /// When the session was created. Never changes.
    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// When the session was last accessed by its owner.
    pub fn last_accessed_time(&self) -> DateTime<Utc> {
        self.last_accessed_time
    }

    /// Sliding expiration window. Negative means the session never expires.
    pub fn max_inactive_interval(&self) -> Duration {
        self.max_inactive_interval
    }

    /// The instant after which the session is invalid: last access time
    /// plus the max inactive interval. Always derived, never stored.
    pub fn expiry_time(&self) -> DateTime<Utc> {
        self.last_accessed_time + self.max_inactive_interval
    }

    /// Whether the session has passed its expiry time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the session would be expired at the given instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.max_inactive_interval < Duration::zero() {
            return false;
        }
        now >= self.expiry_time()
    }

    /// True until the first successful save.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// True if session metadata changed since the last save.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// The attribute changes accumulated since the last save.
    pub fn delta(&self) -> &HashMap<String, AttributeChange> {
        &self.delta
    }

    /// Current attribute state.
    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    /// Get an attribute value by name.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Names of all current attributes.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Set an attribute and record it in the delta.
    ///
    /// Setting the principal-index or security-context attribute marks the
    /// entity changed, since those feed the persisted secondary index.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if name == PRINCIPAL_NAME_INDEX || name == SECURITY_CONTEXT_ATTRIBUTE {
            self.changed = true;
        }
        self.attributes.insert(name.clone(), value.clone());
        self.delta.insert(name, AttributeChange::Set(value));
    }

    /// Remove an attribute, recording a tombstone in the delta.
    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.remove(name);
        self.delta.insert(name.to_string(), AttributeChange::Removed);
    }

    /// Restore an attribute from persisted state, bypassing the delta.
    pub fn restore_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    /// Assign a fresh random identifier, returning its textual form.
    ///
    /// The identifier last known to the backing store is remembered in
    /// `previous_id` so the next save can rename the persisted row. Rotating
    /// again before that save keeps the original stored identifier, not the
    /// intermediate one.
    pub fn rotate_id(&mut self) -> String {
        self.changed = true;
        if self.previous_id.is_none() {
            self.previous_id = Some(self.id);
        }
        self.id = SessionId::generate();
        self.id.to_string()
    }

    /// Update the last access time, marking the entity changed.
    pub fn set_last_accessed_time(&mut self, last_accessed_time: DateTime<Utc>) {
        self.last_accessed_time = last_accessed_time;
        self.changed = true;
    }

    /// Update the max inactive interval, marking the entity changed.
    pub fn set_max_inactive_interval(&mut self, interval: Duration) {
        self.max_inactive_interval = interval;
        self.changed = true;
    }

    /// Forget the pending rename. Called by the store once the rename has
    /// been committed.
    pub fn clear_previous_id(&mut self) {
        self.previous_id = None;
    }

    /// Reset the new/changed flags and empty the delta. Called by the store
    /// after a successful save.
    pub fn clear_change_flags(&mut self) {
        self.is_new = false;
        self.changed = false;
        self.delta.clear();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session_is_new_and_unchanged() {
        let session = Session::new();
        assert!(session.is_new());
        assert!(!session.is_changed());
        assert!(session.delta().is_empty());
        assert_eq!(session.creation_time(), session.last_accessed_time());
        assert_eq!(
            session.max_inactive_interval(),
            Duration::seconds(DEFAULT_MAX_INACTIVE_SECS)
        );
    }

    #[test]
    fn test_set_attribute_records_delta() {
        let mut session = Session::new();
        session.set_attribute("foo", json!("bar"));

        assert_eq!(session.attribute("foo"), Some(&json!("bar")));
        assert_eq!(
            session.delta().get("foo"),
            Some(&AttributeChange::Set(json!("bar")))
        );
        // A plain attribute does not mark the entity changed.
        assert!(!session.is_changed());
    }

    #[test]
    fn test_remove_attribute_records_tombstone() {
        let mut session = Session::new();
        session.set_attribute("foo", json!("bar"));
        session.remove_attribute("foo");

        assert!(session.attribute("foo").is_none());
        assert_eq!(session.delta().get("foo"), Some(&AttributeChange::Removed));
        assert!(!session.is_changed());
    }

    #[test]
    fn test_principal_attribute_marks_changed() {
        let mut session = Session::new();
        session.set_attribute(crate::PRINCIPAL_NAME_INDEX, json!("alice"));
        assert!(session.is_changed());

        let mut session = Session::new();
        session.set_attribute(crate::SECURITY_CONTEXT_ATTRIBUTE, json!({}));
        assert!(session.is_changed());
    }

    #[test]
    fn test_metadata_setters_mark_changed() {
        let mut session = Session::new();
        session.set_last_accessed_time(Utc::now());
        assert!(session.is_changed());

        let mut session = Session::new();
        session.set_max_inactive_interval(Duration::seconds(60));
        assert!(session.is_changed());
    }

    #[test]
    fn test_rotate_id_remembers_stored_id() {
        let mut session = Session::new();
        let original = session.id();

        let rotated = session.rotate_id();
        assert_eq!(rotated, session.id().to_string());
        assert_ne!(session.id(), original);
        assert_eq!(session.previous_id(), Some(original));
        assert!(session.is_changed());
    }

    #[test]
    fn test_double_rotation_keeps_original_previous_id() {
        let mut session = Session::new();
        let original = session.id();

        session.rotate_id();
        session.rotate_id();

        // previous_id is the id last known to the backing store, not the
        // intermediate in-memory one.
        assert_eq!(session.previous_id(), Some(original));
    }

    #[test]
    fn test_expiry_time_is_derived() {
        let mut session = Session::new();
        let last_access = Utc::now();
        session.set_last_accessed_time(last_access);
        session.set_max_inactive_interval(Duration::seconds(120));

        assert_eq!(session.expiry_time(), last_access + Duration::seconds(120));
    }

    #[test]
    fn test_identical_inputs_yield_identical_expiry() {
        let last_access = Utc::now();
        let interval = Duration::seconds(300);

        let mut a = Session::new();
        a.set_last_accessed_time(last_access);
        a.set_max_inactive_interval(interval);

        let mut b = Session::new();
        b.set_last_accessed_time(last_access);
        b.set_max_inactive_interval(interval);

        assert_eq!(a.expiry_time(), b.expiry_time());
    }

    #[test]
    fn test_expired_when_window_passed() {
        let mut session = Session::new();
        session.set_last_accessed_time(Utc::now() - Duration::seconds(3600));
        session.set_max_inactive_interval(Duration::seconds(1800));

        assert!(session.is_expired());
    }

    #[test]
    fn test_negative_interval_never_expires() {
        let mut session = Session::new();
        session.set_last_accessed_time(Utc::now() - Duration::seconds(3600));
        session.set_max_inactive_interval(Duration::seconds(-1));

        assert!(!session.is_expired());
    }

    #[test]
    fn test_clear_change_flags_resets_state() {
        let mut session = Session::new();
        session.set_attribute("foo", json!(1));
        session.set_last_accessed_time(Utc::now());
        session.clear_change_flags();

        assert!(!session.is_new());
        assert!(!session.is_changed());
        assert!(session.delta().is_empty());
        // Attribute state itself survives.
        assert_eq!(session.attribute("foo"), Some(&json!(1)));
    }

    #[test]
    fn test_restored_session_is_clean() {
        let id = SessionId::generate();
        let now = Utc::now();
        let mut session = Session::restored(id, now, now, Duration::seconds(600));
        session.restore_attribute("foo", json!("bar"));

        assert!(!session.is_new());
        assert!(!session.is_changed());
        assert!(session.delta().is_empty());
        assert_eq!(session.attribute("foo"), Some(&json!("bar")));
    }
}
