//! Bunch and replica identifiers.

use crate::error::InvalidBunchId;
use smartstring::alias::String as SmolStr;
use std::fmt::{Display, Formatter};

/// Identifies a bunch: a maximal run of positions created by a single `create_positions` call
/// (or loaded as such), all sharing one parent attachment point in the [`crate::order::Order`]
/// tree.
///
/// Stored as a small-string-optimized string (most replica/bunch ids used in practice are a
/// short replica tag plus a base-36 counter, well under the inline capacity) rather than a
/// bare `String`, matching how this lineage represents its own short textual identifiers.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct BunchId(SmolStr);

impl BunchId {
    /// The reserved id of the root bunch. Never appears in a [`crate::position::BunchMeta`].
    pub const ROOT_STR: &'static str = "ROOT";

    /// Validate and wrap a caller-supplied bunch id.
    ///
    /// Rejects `"ROOT"` (reserved), `','` and `'.'` (reserved separators in saved-state and
    /// serialized position encodings), the empty string, and anything that would not sort
    /// strictly before `"~"` (keeps ids in the printable-ASCII range assumed by the sibling
    /// comparator).
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidBunchId> {
        let id = id.into();
        if id.is_empty() {
            return Err(InvalidBunchId::Empty);
        }
        if id == Self::ROOT_STR {
            return Err(InvalidBunchId::ReservedRoot);
        }
        if id.contains(',') || id.contains('.') {
            return Err(InvalidBunchId::ForbiddenChar);
        }
        if id.as_str() >= "~" {
            return Err(InvalidBunchId::TooLarge);
        }
        Ok(Self(id.into()))
    }

    /// Build a bunch id without validating it. Used internally for ids this crate mints itself
    /// (the default factory's `{replica_id}_{counter}` ids are always well-formed by
    /// construction) and for the reserved root id.
    pub(crate) fn from_trusted(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    pub(crate) fn root() -> Self {
        Self::from_trusted(Self::ROOT_STR)
    }

    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT_STR
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BunchId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BunchId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for BunchId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for BunchId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BunchId::new(s).map_err(serde::de::Error::custom)
    }
}

/// Compares two bunch ids as if `","` were appended to each: `a < b` under this comparator
/// matches sorting `format!("{a},")` against `format!("{b},")` without allocating. Used to
/// break ties between sibling bunches attached at the same offset of the same parent — see
/// `Order::compare_siblings`.
///
/// `','` (0x2C) is forbidden inside a valid bunch id, and every id this crate mints uses
/// base-36 digits, so in practice this agrees with a plain string comparison; the trailing-comma
/// semantics only matter when one id is an exact prefix of another and a caller-supplied
/// factory produced ids containing characters below `','`.
pub(crate) fn compare_with_trailing_comma(a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let min_len = a.len().min(b.len());
    match a.as_bytes()[..min_len].cmp(&b.as_bytes()[..min_len]) {
        Ordering::Equal => match a.len().cmp(&b.len()) {
            Ordering::Equal => Ordering::Equal,
            Ordering::Less => b.as_bytes()[a.len()].cmp(&b',').reverse(),
            Ordering::Greater => a.as_bytes()[b.len()].cmp(&b','),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_root_and_separators() {
        assert_eq!(BunchId::new("ROOT").unwrap_err(), InvalidBunchId::ReservedRoot);
        assert_eq!(BunchId::new("a,b").unwrap_err(), InvalidBunchId::ForbiddenChar);
        assert_eq!(BunchId::new("a.b").unwrap_err(), InvalidBunchId::ForbiddenChar);
        assert_eq!(BunchId::new("").unwrap_err(), InvalidBunchId::Empty);
        assert!(BunchId::new("alice_3f").is_ok());
    }

    #[test]
    fn trailing_comma_compare_matches_naive_concat() {
        let cases = [("abc", "abcd"), ("abc", "abd"), ("ab", "ab"), ("z", "ab")];
        for (a, b) in cases {
            let expected = format!("{a},").cmp(&format!("{b},"));
            assert_eq!(compare_with_trailing_comma(a, b), expected, "{a} vs {b}");
        }
    }
}
