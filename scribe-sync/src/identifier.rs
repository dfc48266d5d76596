//! Deterministic mapping of free-form document keys to stable storage keys
//!
//! Canonical identifiers are lowercase `8-4-4-4-12` hex groups. Anything else
//! is hashed (UUID v5, SHA-1 name-based) under a fixed namespace, so the same
//! raw key maps to the same identifier across process restarts.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use uuid::Uuid;

use crate::error::IdentifierError;

lazy_static! {
    static ref CANONICAL_REGEX: Regex =
        Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap();
}

/// Namespace for note identifiers. Changing it re-keys every stored note.
pub const NOTE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93b7_5d08_b2e1_7c4a_9f30_d615);

/// Storage key in canonical `8-4-4-4-12` lowercase hex form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StableIdentifier(String);

impl StableIdentifier {
    /// Accept `s` only if it is already canonical
    pub fn parse(s: &str) -> Option<Self> {
        is_stable(s).then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StableIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StableIdentifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_stable(&value) {
            Ok(Self(value))
        } else {
            Err(IdentifierError::InvalidInput(value))
        }
    }
}

impl From<StableIdentifier> for String {
    fn from(id: StableIdentifier) -> Self {
        id.0
    }
}

/// True iff `s` is in canonical form
pub fn is_stable(s: &str) -> bool {
    CANONICAL_REGEX.is_match(s)
}

/// Bridges raw external keys to stable identifiers
#[derive(Debug, Clone, Copy)]
pub struct IdentifierReconciler {
    namespace: Uuid,
}

impl Default for IdentifierReconciler {
    fn default() -> Self {
        Self::new(NOTE_NAMESPACE)
    }
}

impl IdentifierReconciler {
    pub fn new(namespace: Uuid) -> Self {
        Self { namespace }
    }

    pub fn is_stable(&self, s: &str) -> bool {
        is_stable(s)
    }

    /// Map `s` to a stable identifier.
    ///
    /// Canonical input is returned unchanged; anything else is hashed under
    /// the namespace. If hashing ever produces a non-canonical value the input
    /// is re-hashed with a timestamp salt and a warning is logged. That path
    /// gives up idempotence for the affected key.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidInput`] for an empty string.
    pub fn ensure_stable(&self, s: &str) -> Result<StableIdentifier, IdentifierError> {
        self.reconcile(s, |name| self.derive(name))
    }

    fn derive(&self, name: &str) -> Result<StableIdentifier, IdentifierError> {
        let candidate = Uuid::new_v5(&self.namespace, name.as_bytes())
            .hyphenated()
            .to_string();
        StableIdentifier::parse(&candidate).ok_or(IdentifierError::Derivation(candidate))
    }

    fn reconcile<F>(&self, s: &str, derive: F) -> Result<StableIdentifier, IdentifierError>
    where
        F: Fn(&str) -> Result<StableIdentifier, IdentifierError>,
    {
        if s.is_empty() {
            return Err(IdentifierError::InvalidInput(
                "identifier input must not be empty".to_string(),
            ));
        }

        if let Some(id) = StableIdentifier::parse(s) {
            return Ok(id);
        }

        match derive(s) {
            Ok(id) => Ok(id),
            Err(e) => {
                warn!(error = %e, "Identifier hashing failed, falling back to salted key; key is no longer idempotent");
                let salted = format!("{s}#{}", Utc::now().timestamp_micros());
                Ok(derive(&salted).unwrap_or_else(|_| {
                    StableIdentifier(Uuid::new_v4().hyphenated().to_string())
                }))
            }
        }
    }
}

/// [`IdentifierReconciler::ensure_stable`] under the default namespace
///
/// # Errors
///
/// Returns [`IdentifierError::InvalidInput`] for an empty string.
pub fn ensure_stable(s: &str) -> Result<StableIdentifier, IdentifierError> {
    IdentifierReconciler::default().ensure_stable(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;

    #[test]
    fn test_canonical_input_is_returned_unchanged() {
        let raw = "123e4567-e89b-12d3-a456-426614174000";
        assert!(is_stable(raw));
        assert_eq!(ensure_stable(raw).unwrap().as_str(), raw);
    }

    #[test]
    fn test_uppercase_uuid_is_not_canonical() {
        let raw = "123E4567-E89B-12D3-A456-426614174000";
        assert!(!is_stable(raw));
        let id = ensure_stable(raw).unwrap();
        assert_ne!(id.as_str(), raw);
        assert!(is_stable(id.as_str()));
    }

    #[test]
    fn test_rejects_malformed_shapes() {
        assert!(!is_stable(""));
        assert!(!is_stable("123e4567e89b12d3a456426614174000"));
        assert!(!is_stable("123e4567-e89b-12d3-a456-42661417400"));
        assert!(!is_stable(" 123e4567-e89b-12d3-a456-426614174000"));
        assert!(!is_stable("g23e4567-e89b-12d3-a456-426614174000"));
    }

    #[test]
    fn test_empty_input_is_invalid() {
        assert!(matches!(ensure_stable(""), Err(IdentifierError::InvalidInput(_))));
    }

    #[test]
    fn test_same_input_same_output_across_reconcilers() {
        let a = IdentifierReconciler::default().ensure_stable("encounter-42").unwrap();
        let b = IdentifierReconciler::new(NOTE_NAMESPACE).ensure_stable("encounter-42").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), Uuid::new_v5(&NOTE_NAMESPACE, b"encounter-42").to_string());
    }

    #[test]
    fn test_namespace_changes_output() {
        let other = IdentifierReconciler::new(Uuid::from_u128(1));
        assert_ne!(
            other.ensure_stable("encounter-42").unwrap(),
            ensure_stable("encounter-42").unwrap()
        );
    }

    #[test]
    fn test_derivation_fault_falls_back_to_salted_key() {
        let reconciler = IdentifierReconciler::default();
        let calls = Cell::new(0);
        let id = reconciler
            .reconcile("note-7", |name| {
                calls.set(calls.get() + 1);
                if name == "note-7" {
                    Err(IdentifierError::Derivation("bad".to_string()))
                } else {
                    reconciler.derive(name)
                }
            })
            .unwrap();

        assert_eq!(calls.get(), 2);
        assert!(is_stable(id.as_str()));
        assert_ne!(id, reconciler.ensure_stable("note-7").unwrap());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<StableIdentifier, _> =
            serde_json::from_str(r#""123e4567-e89b-12d3-a456-426614174000""#);
        assert!(ok.is_ok());
        let bad: Result<StableIdentifier, _> = serde_json::from_str(r#""patient-1""#);
        assert!(bad.is_err());
    }

    proptest! {
        #[test]
        fn prop_ensure_stable_is_idempotent(s in ".+") {
            let once = ensure_stable(&s).unwrap();
            let twice = ensure_stable(once.as_str()).unwrap();
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(once, ensure_stable(&s).unwrap());
        }

        #[test]
        fn prop_output_is_always_canonical(s in ".+") {
            let id = ensure_stable(&s).unwrap();
            prop_assert!(is_stable(id.as_str()));
        }

        #[test]
        fn prop_distinct_inputs_do_not_collide(a in "[a-z0-9-]{1,24}", b in "[a-z0-9-]{1,24}") {
            prop_assume!(a != b);
            prop_assume!(!is_stable(&a) && !is_stable(&b));
            prop_assert_ne!(ensure_stable(&a).unwrap(), ensure_stable(&b).unwrap());
        }
    }
}
