//! Subject identity and the dedupe set tied to it
//!
//! The identity context owns the current subject (whose notifications are
//! polled) and the set of notification ids already delivered for it. Any
//! set or clear wipes the seen set, so a fresh login always re-synchronizes
//! from empty. A generation counter lets an in-flight poll notice that the
//! identity moved underneath it.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::HeraldError;
use crate::notification::NotificationId;

/// Integer identity of the user whose notifications are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub i64);

impl SubjectId {
    /// Convert loosely-typed host input (number or numeric string)
    pub fn from_value(value: &Value) -> Result<Self, HeraldError> {
        let invalid = || HeraldError::InvalidSubject(value.to_string());
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self(i))
                } else {
                    n.as_f64().and_then(integral).map(Self).ok_or_else(invalid)
                }
            }
            Value::String(s) => s.parse(),
            _ => Err(invalid()),
        }
    }
}

/// Accept floats like `42.0` that carry an exact integer
fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl FromStr for SubjectId {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(HeraldError::InvalidSubject(s.to_string()));
        }
        trimmed
            .parse::<i64>()
            .ok()
            .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
            .map(Self)
            .ok_or_else(|| HeraldError::InvalidSubject(s.to_string()))
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification ids already delivered for the current subject
#[derive(Debug, Default)]
pub struct SeenRegistry {
    ids: HashSet<NotificationId>,
}

impl SeenRegistry {
    pub fn contains(&self, id: &NotificationId) -> bool {
        self.ids.contains(id)
    }

    pub fn insert(&mut self, id: NotificationId) {
        self.ids.insert(id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Current subject plus its dedupe state
#[derive(Debug, Default)]
pub struct IdentityContext {
    subject: Option<SubjectId>,
    seen: SeenRegistry,
    /// Bumped on every set/clear
    generation: u64,
}

impl IdentityContext {
    /// Store a subject. Setting the same value again still resets dedupe state.
    pub fn set_subject(&mut self, subject: SubjectId) {
        self.subject = Some(subject);
        self.reset();
    }

    pub fn clear_subject(&mut self) {
        self.subject = None;
        self.reset();
    }

    fn reset(&mut self) {
        self.seen.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn subject(&self) -> Option<SubjectId> {
        self.subject
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn seen(&self) -> &SeenRegistry {
        &self.seen
    }

    /// Record an id as delivered, but only if the identity is still the one
    /// the caller observed. Returns false when the generation moved on.
    pub fn mark_seen(&mut self, generation: u64, id: NotificationId) -> bool {
        if generation != self.generation {
            return false;
        }
        self.seen.insert(id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subject_from_number() {
        assert_eq!(SubjectId::from_value(&json!(42)).unwrap(), SubjectId(42));
        assert_eq!(SubjectId::from_value(&json!(7.0)).unwrap(), SubjectId(7));
    }

    #[test]
    fn test_subject_from_numeric_string() {
        assert_eq!(SubjectId::from_value(&json!("42")).unwrap(), SubjectId(42));
        assert_eq!(SubjectId::from_value(&json!(" 9 ")).unwrap(), SubjectId(9));
        assert_eq!("1e3".parse::<SubjectId>().unwrap(), SubjectId(1000));
    }

    #[test]
    fn test_subject_rejects_non_numeric() {
        for value in [
            json!("abc"),
            json!(""),
            json!(null),
            json!(true),
            json!(4.5),
            json!([1]),
            json!({"id": 1}),
        ] {
            let err = SubjectId::from_value(&value).unwrap_err();
            assert_eq!(err.kind(), "invalid_subject", "value {value} should be rejected");
        }
        assert!("inf".parse::<SubjectId>().is_err());
        assert!("NaN".parse::<SubjectId>().is_err());
    }

    #[test]
    fn test_set_subject_clears_seen() {
        let mut ctx = IdentityContext::default();
        ctx.set_subject(SubjectId(1));
        let generation = ctx.generation();
        assert!(ctx.mark_seen(generation, NotificationId::Int(10)));
        assert_eq!(ctx.seen().len(), 1);

        // Same value again still resets
        ctx.set_subject(SubjectId(1));
        assert!(ctx.seen().is_empty());
        assert_eq!(ctx.subject(), Some(SubjectId(1)));
    }

    #[test]
    fn test_clear_subject() {
        let mut ctx = IdentityContext::default();
        ctx.set_subject(SubjectId(3));
        let generation = ctx.generation();
        ctx.mark_seen(generation, NotificationId::Text("a".to_string()));

        ctx.clear_subject();
        assert_eq!(ctx.subject(), None);
        assert!(ctx.seen().is_empty());
    }

    #[test]
    fn test_mark_seen_rejects_stale_generation() {
        let mut ctx = IdentityContext::default();
        ctx.set_subject(SubjectId(1));
        let stale = ctx.generation();
        ctx.set_subject(SubjectId(2));

        assert!(!ctx.mark_seen(stale, NotificationId::Int(5)));
        assert!(!ctx.seen().contains(&NotificationId::Int(5)));
    }
}
