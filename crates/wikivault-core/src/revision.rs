//! Revision identifiers and key-generation validity bounds.
//!
//! The revision store hands out integer revision ids. A key generation is
//! valid over a range of them. The persisted form uses integer strings with
//! `"-1"` as a sentinel, which means "unset" in a start position and
//! "unbounded" in an end position. In memory the two meanings are
//! separate types: [`RevisionStart`] and [`RevisionEnd`].

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Persisted sentinel for [`RevisionStart::Unset`] and [`RevisionEnd::Unbounded`].
pub const REVISION_SENTINEL: &str = "-1";

/// A revision id assigned by the revision store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevisionId(pub u64);

impl RevisionId {
    /// The first id of any page's history.
    pub const ZERO: Self = Self(0);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rev({})", self.0)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RevisionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| CoreError::InvalidRevision(s.to_string()))
    }
}

impl From<u64> for RevisionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Where a key generation starts being used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevisionStart {
    /// The generation has not encrypted any revision yet.
    Unset,
    /// First revision encrypted with the generation.
    At(RevisionId),
}

impl RevisionStart {
    pub fn is_unset(&self) -> bool {
        matches!(self, RevisionStart::Unset)
    }

    pub fn id(&self) -> Option<RevisionId> {
        match self {
            RevisionStart::Unset => None,
            RevisionStart::At(id) => Some(*id),
        }
    }

    /// The earlier of two starts. A concrete start beats `Unset`.
    pub fn earliest(self, other: Self) -> Self {
        match (self, other) {
            (RevisionStart::At(a), RevisionStart::At(b)) => RevisionStart::At(a.min(b)),
            (RevisionStart::At(a), RevisionStart::Unset)
            | (RevisionStart::Unset, RevisionStart::At(a)) => RevisionStart::At(a),
            (RevisionStart::Unset, RevisionStart::Unset) => RevisionStart::Unset,
        }
    }
}

/// Chronological order: concrete starts by id, `Unset` last.
impl Ord for RevisionStart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RevisionStart::At(a), RevisionStart::At(b)) => a.cmp(b),
            (RevisionStart::At(_), RevisionStart::Unset) => Ordering::Less,
            (RevisionStart::Unset, RevisionStart::At(_)) => Ordering::Greater,
            (RevisionStart::Unset, RevisionStart::Unset) => Ordering::Equal,
        }
    }
}

impl PartialOrd for RevisionStart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Where a key generation stops being used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevisionEnd {
    /// Still the active generation.
    Unbounded,
    /// Last revision encrypted with the generation.
    At(RevisionId),
}

impl RevisionEnd {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, RevisionEnd::Unbounded)
    }

    pub fn id(&self) -> Option<RevisionId> {
        match self {
            RevisionEnd::Unbounded => None,
            RevisionEnd::At(id) => Some(*id),
        }
    }

    /// The more advanced of two ends. A concrete end beats `Unbounded`,
    /// since it records a revocation the other copy has not seen.
    pub fn most_advanced(self, other: Self) -> Self {
        match (self, other) {
            (RevisionEnd::At(a), RevisionEnd::At(b)) => RevisionEnd::At(a.max(b)),
            (RevisionEnd::At(a), RevisionEnd::Unbounded)
            | (RevisionEnd::Unbounded, RevisionEnd::At(a)) => RevisionEnd::At(a),
            (RevisionEnd::Unbounded, RevisionEnd::Unbounded) => RevisionEnd::Unbounded,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serde: integer strings with the "-1" sentinel
// ─────────────────────────────────────────────────────────────────────────────

struct RevisionTextVisitor;

impl<'de> Visitor<'de> for RevisionTextVisitor {
    type Value = Option<RevisionId>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a revision id as an integer string, or \"-1\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        if v.trim() == REVISION_SENTINEL {
            return Ok(None);
        }
        v.parse::<RevisionId>().map(Some).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        match v {
            -1 => Ok(None),
            v if v >= 0 => Ok(Some(RevisionId(v as u64))),
            v => Err(E::custom(format!("negative revision id {}", v))),
        }
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(RevisionId(v)))
    }
}

fn serialize_revision_text<S: Serializer>(id: Option<RevisionId>, serializer: S) -> Result<S::Ok, S::Error> {
    match id {
        Some(id) => serializer.serialize_str(&id.to_string()),
        None => serializer.serialize_str(REVISION_SENTINEL),
    }
}

impl Serialize for RevisionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RevisionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_any(RevisionTextVisitor)?
            .ok_or_else(|| de::Error::custom("sentinel is not a revision id"))
    }
}

impl Serialize for RevisionStart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_revision_text(self.id(), serializer)
    }
}

impl<'de> Deserialize<'de> for RevisionStart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match deserializer.deserialize_any(RevisionTextVisitor)? {
            Some(id) => RevisionStart::At(id),
            None => RevisionStart::Unset,
        })
    }
}

impl Serialize for RevisionEnd {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_revision_text(self.id(), serializer)
    }
}

impl<'de> Deserialize<'de> for RevisionEnd {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match deserializer.deserialize_any(RevisionTextVisitor)? {
            Some(id) => RevisionEnd::At(id),
            None => RevisionEnd::Unbounded,
        })
    }
}
