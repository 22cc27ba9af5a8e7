//! 📦 Common data structures: the building blocks of backfill.
//!
//! 🎬 COLD OPEN. INT. DATA CENTER, 3:47 AM
//!
//! A table scan is pouring rows faster than anyone asked for. Somewhere downstream
//! a bucket waits, patient, indifferent. Between them: these types. A [`Record`]
//! carries one row. A [`DestinationPath`] says where that row will live forever,
//! or at least until the next backfill overwrites it with the exact same bytes.
//!
//! 🦆
//!
//! ⚠️ Records have no identity beyond their key fields. Two records with the same
//! key fields land on the same path. That is the whole idempotency story.

use std::fmt;

/// 📄 One row from the scan: field name → JSON value.
///
/// `serde_json::Map` is `BTreeMap`-backed, so field order is stable and any
/// serialization of it is canonical. Immutable once produced, by convention and by
/// the fact that everybody downstream only borrows it.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// 🗺️ Where a record goes to live: `{prefix}/{source_name}/{digest_hex}`.
///
/// Built only by [`KeyDeriver`](crate::keys::KeyDeriver). Same key fields in,
/// same path out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationPath(String);

impl DestinationPath {
    /// 🔧 Joins the non-empty segments with `/`. Slashes at the segment edges get trimmed
    /// so nobody ends up with `backups//table//abc`.
    pub(crate) fn from_segments(prefix: &str, source_name: &str, digest_hex: &str) -> Self {
        let joined = [prefix, source_name, digest_hex]
            .iter()
            .map(|segment| segment.trim_matches('/'))
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DestinationPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_segments_join_with_single_slashes() {
        let path = DestinationPath::from_segments("/backups/", "users", "abc123");
        assert_eq!(path.as_str(), "backups/users/abc123");
    }

    #[test]
    fn the_one_where_an_empty_prefix_just_disappears() {
        // 🧪 no prefix, no leading slash. the bucket root is a fine place to live.
        let path = DestinationPath::from_segments("", "users", "abc123");
        assert_eq!(path.to_string(), "users/abc123");
    }
}
