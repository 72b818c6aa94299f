//! Translation of document-store identifiers into store keys.
//!
//! Each imported table gets its own id space. Keys are handed out
//! sequentially from 0 in the order documents are first seen, so a rerun
//! over the same dump assigns the same keys.

use std::collections::HashMap;
use std::fmt;

use bson::Bson;
use flow_sqlite::Table;

/// A document identifier as found in the dump.
///
/// String ids are kept verbatim, object ids by their hex form, and integer
/// ids by their decimal form, so the same logical id always maps to the
/// same key whichever way a referencing document spells it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalId(String);

impl ExternalId {
    /// Builds an id from a BSON value, or `None` for values that cannot
    /// identify a document (null, documents, arrays, ...).
    pub fn from_bson(value: &Bson) -> Option<Self> {
        match value {
            Bson::String(s) => Some(Self(s.clone())),
            Bson::ObjectId(oid) => Some(Self(oid.to_hex())),
            Bson::Int32(n) => Some(Self(n.to_string())),
            Bson::Int64(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExternalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Space {
    forward: HashMap<ExternalId, i64>,
    reverse: Vec<ExternalId>,
}

/// Per-table maps from external ids to assigned keys.
///
/// # Examples
///
/// ```
/// use flow_import::{ExternalId, IdMap};
/// use flow_sqlite::Table;
///
/// let mut idmap = IdMap::new();
/// assert_eq!(idmap.assign(Table::Course, ExternalId::from("cs135")), 0);
/// assert_eq!(idmap.assign(Table::Course, ExternalId::from("math135")), 1);
///
/// assert_eq!(idmap.resolve(Table::Course, &ExternalId::from("math135")), Some(1));
/// assert_eq!(idmap.external(Table::Course, 0).map(|id| id.as_str()), Some("cs135"));
/// ```
#[derive(Debug, Default)]
pub struct IdMap {
    spaces: HashMap<Table, Space>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the key for `external`, assigning the next one if unseen.
    pub fn assign(&mut self, table: Table, external: ExternalId) -> i64 {
        let space = self.spaces.entry(table).or_default();
        if let Some(&id) = space.forward.get(&external) {
            return id;
        }
        let id = space.reverse.len() as i64;
        space.forward.insert(external.clone(), id);
        space.reverse.push(external);
        id
    }

    /// Looks up the key assigned to `external`.
    pub fn resolve(&self, table: Table, external: &ExternalId) -> Option<i64> {
        self.spaces.get(&table)?.forward.get(external).copied()
    }

    /// Resolves an optional BSON reference; absent or unknown ids give `None`.
    pub fn resolve_bson(&self, table: Table, value: Option<&Bson>) -> Option<i64> {
        let external = ExternalId::from_bson(value?)?;
        self.resolve(table, &external)
    }

    /// Reverse lookup from an assigned key.
    pub fn external(&self, table: Table, id: i64) -> Option<&ExternalId> {
        let index = usize::try_from(id).ok()?;
        self.spaces.get(&table)?.reverse.get(index)
    }

    /// Forgets every key of `table`.
    pub(crate) fn clear(&mut self, table: Table) {
        self.spaces.remove(&table);
    }

    /// Removes and returns the keys of `table`, leaving it empty.
    pub(crate) fn take(&mut self, table: Table) -> Space {
        self.spaces.remove(&table).unwrap_or_default()
    }

    /// Puts back keys removed by [`take`](Self::take).
    pub(crate) fn restore(&mut self, table: Table, space: Space) {
        self.spaces.insert(table, space);
    }

    /// Number of keys assigned in `table`.
    pub fn len(&self, table: Table) -> usize {
        self.spaces.get(&table).map_or(0, |s| s.reverse.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn test_spaces_are_independent() {
        let mut idmap = IdMap::new();
        idmap.assign(Table::Prof, "a".into());
        assert_eq!(idmap.assign(Table::User, "a".into()), 0);
        assert_eq!(idmap.assign(Table::Prof, "b".into()), 1);
        assert_eq!(idmap.resolve(Table::Course, &"a".into()), None);
    }

    #[test]
    fn test_assign_is_stable_for_repeats() {
        let mut idmap = IdMap::new();
        assert_eq!(idmap.assign(Table::User, "x".into()), 0);
        assert_eq!(idmap.assign(Table::User, "x".into()), 0);
        assert_eq!(idmap.len(Table::User), 1);
    }

    #[test]
    fn test_object_id_resolves_by_hex() {
        let oid = ObjectId::new();
        let mut idmap = IdMap::new();
        idmap.assign(
            Table::CourseReview,
            ExternalId::from_bson(&Bson::ObjectId(oid)).unwrap(),
        );
        assert_eq!(
            idmap.resolve_bson(Table::CourseReview, Some(&Bson::ObjectId(oid))),
            Some(0)
        );
        assert_eq!(
            idmap.resolve(Table::CourseReview, &ExternalId::from(oid.to_hex().as_str())),
            Some(0)
        );
    }

    #[test]
    fn test_unusable_references_resolve_to_none() {
        let mut idmap = IdMap::new();
        idmap.assign(Table::Course, "cs135".into());
        assert_eq!(idmap.resolve_bson(Table::Course, None), None);
        assert_eq!(idmap.resolve_bson(Table::Course, Some(&Bson::Null)), None);
        assert_eq!(
            idmap.resolve_bson(Table::Course, Some(&Bson::String("cs999".into()))),
            None
        );
        assert_eq!(idmap.external(Table::Course, -1), None);
    }

    #[test]
    fn test_clear_resets_numbering() {
        let mut idmap = IdMap::new();
        idmap.assign(Table::Course, "a".into());
        idmap.assign(Table::Course, "b".into());
        idmap.clear(Table::Course);
        assert_eq!(idmap.len(Table::Course), 0);
        assert_eq!(idmap.assign(Table::Course, "b".into()), 0);
    }
}
