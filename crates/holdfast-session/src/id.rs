//! Composite 128-bit session identifiers.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::SessionError;

/// A 128-bit session identifier, persisted as two signed 64-bit halves.
///
/// The textual form is the canonical hyphenated UUID string. Splitting the
/// value into an integer pair keeps the primary key compact and
/// index-friendly in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Reassemble an identifier from its two stored halves.
    pub fn from_halves(hi: i64, lo: i64) -> Self {
        Self(Uuid::from_u64_pair(hi as u64, lo as u64))
    }

    /// The two signed 64-bit halves used for storage.
    pub fn halves(&self) -> (i64, i64) {
        let (hi, lo) = self.0.as_u64_pair();
        (hi as i64, lo as i64)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textual_round_trip() {
        let id = SessionId::generate();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_halves_round_trip() {
        let id = SessionId::generate();
        let (hi, lo) = id.halves();
        assert_eq!(SessionId::from_halves(hi, lo), id);
    }

    #[test]
    fn test_halves_round_trip_negative() {
        // High bit set in both words maps to negative i64 values.
        let id = SessionId::from_halves(-1, i64::MIN);
        let (hi, lo) = id.halves();
        assert_eq!(hi, -1);
        assert_eq!(lo, i64::MIN);
    }

    #[test]
    fn test_malformed_text_rejected() {
        let result = "not-a-session-id".parse::<SessionId>();
        assert!(matches!(result, Err(SessionError::MalformedId(_))));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
