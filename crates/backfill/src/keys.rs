//! 🔑 Keys: turning a record into an address.
//!
//! The source tells us which fields make a record unique. We sort them (declaration
//! order is the source's business, not ours), project each record onto them, hash
//! the canonical JSON, and hand back a [`DestinationPath`].
//!
//! 🧠 Knowledge graph:
//! - [`KeySchema`]: sorted, deduplicated key field names. Never empty.
//! - [`KeyDeriver`]: prefix + source name + schema. Pure. No I/O. No feelings.
//! - Digest: md5, hex encoded. Used for partitioning paths, not for security.
//!   If you are reaching for this to protect something, please put the keyboard down. 🦆

use md5::{Digest, Md5};
use serde_json::Value;

use crate::common::{DestinationPath, Record};
use crate::drain::DrainError;

/// 📐 The table's key fields, sorted by name.
///
/// A `{hash, range}` table and a `{range, hash}` declaration of the same table must
/// derive the same paths, so the order the source declared them in is thrown away here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    fields: Vec<String>,
}

impl KeySchema {
    /// 🚀 Sorts and dedups the declared fields. Zero fields is a configuration error:
    /// without a key there is no idempotent path, and without that there is no backfill.
    pub fn new<I, S>(declared: I) -> Result<Self, DrainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = declared.into_iter().map(Into::into).collect();
        fields.sort();
        fields.dedup();
        if fields.is_empty() {
            return Err(DrainError::Configuration(
                "💀 The source declared zero key fields. We cannot derive a destination path \
                 from nothing. Check the table's key schema (or `key_fields` in the config)."
                    .to_string(),
            ));
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// 🧭 Record → [`DestinationPath`]. Deterministic, stateless after construction.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    prefix: String,
    source_name: String,
    schema: KeySchema,
}

impl KeyDeriver {
    pub fn new(prefix: impl Into<String>, source_name: impl Into<String>, schema: KeySchema) -> Self {
        Self {
            prefix: prefix.into(),
            source_name: source_name.into(),
            schema,
        }
    }

    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    /// 🎯 Project, serialize, hash, format.
    ///
    /// The digest is the md5 of the compact JSON object holding only the key fields, keys
    /// sorted: a row keyed on `id = "a"` hashes `{"id":"a"}`. Not the bare value `a`, and not
    /// DynamoDB's typed `{"id":{"S":"a"}}`.
    ///
    /// Key fields missing from the record are left out of the derived key, same as a
    /// projection of an undefined attribute.
    pub fn derive(&self, record: &Record) -> DestinationPath {
        let derived_key: serde_json::Map<String, Value> = self
            .schema
            .fields
            .iter()
            .filter_map(|field| record.get(field).map(|value| (field.clone(), value.clone())))
            .collect();

        // -- 🔒 Map is BTreeMap-backed all the way down, so the bytes are canonical.
        let canonical = Value::Object(derived_key).to_string();
        let digest_hex = hex::encode(Md5::digest(canonical.as_bytes()));

        DestinationPath::from_segments(&self.prefix, &self.source_name, &digest_hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("💀 test records must be objects, got {other}"),
        }
    }

    fn md5_hex(input: &str) -> String {
        hex::encode(Md5::digest(input.as_bytes()))
    }

    #[test]
    fn the_one_where_declaration_order_does_not_matter() {
        // 🧪 {hash, range} vs {range, hash}: same table, same paths
        let row = record(json!({"hash": "h1", "range": 7, "payload": "whatever"}));
        let declared_hash_first =
            KeyDeriver::new("backups", "users", KeySchema::new(["hash", "range"]).unwrap());
        let declared_range_first =
            KeyDeriver::new("backups", "users", KeySchema::new(["range", "hash"]).unwrap());

        assert_eq!(
            declared_hash_first.derive(&row),
            declared_range_first.derive(&row)
        );
    }

    #[test]
    fn the_one_where_deriving_twice_gives_the_same_path() {
        let deriver = KeyDeriver::new("p", "t", KeySchema::new(["id"]).unwrap());
        let row = record(json!({"id": "a", "n": 1}));
        assert_eq!(deriver.derive(&row), deriver.derive(&row));
    }

    #[test]
    fn the_one_where_the_path_is_prefix_source_and_md5() {
        let deriver = KeyDeriver::new("backups", "users", KeySchema::new(["id"]).unwrap());
        let path = deriver.derive(&record(json!({"id": "a", "name": "ada"})));
        let expected = format!("backups/users/{}", md5_hex(r#"{"id":"a"}"#));
        assert_eq!(path.as_str(), expected);
    }

    #[test]
    fn the_one_where_non_key_fields_do_not_change_the_path() {
        // 🧪 only key fields feed the digest, so an updated row overwrites its old self
        let deriver = KeyDeriver::new("p", "t", KeySchema::new(["id"]).unwrap());
        let before = deriver.derive(&record(json!({"id": 1, "status": "old"})));
        let after = deriver.derive(&record(json!({"id": 1, "status": "new"})));
        assert_eq!(before, after);
    }

    #[test]
    fn the_one_where_different_keys_get_different_paths() {
        let deriver = KeyDeriver::new("p", "t", KeySchema::new(["id"]).unwrap());
        let paths: std::collections::BTreeSet<_> = ["a", "b", "c"]
            .iter()
            .map(|id| deriver.derive(&record(json!({ "id": id }))))
            .collect();
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn the_one_where_an_empty_schema_gets_turned_away() {
        let result = KeySchema::new(Vec::<String>::new());
        assert!(matches!(result, Err(DrainError::Configuration(_))));
    }

    #[test]
    fn the_one_where_duplicate_declarations_collapse() {
        let schema = KeySchema::new(["range", "hash", "range"]).unwrap();
        assert_eq!(schema.fields(), ["hash".to_string(), "range".to_string()]);
    }
}
