use std::{ hash::{ Hash, Hasher }, rc::Rc };

use derive_more::Deref;
use fxhash::{ FxHashMap, FxHasher };
use schema_eval::{ Location, TraceNode };
use serde_json::Value;
use tracing::{ debug, trace };

use crate::{ error::Error, indexer::{ SchemaKeys, index_schema }, sort_key::SortKey };

/// Indexed schema resources, by canonical URI.
///
/// A cache may be reused for any number of documents and schemas. Each entry
/// remembers a fingerprint of the content it was indexed from, so a schema
/// whose content changes under the same `$id` is indexed again rather than
/// served stale keys. It is not shared between threads; concurrent callers
/// each use their own.
#[derive(Debug, Default)]
pub struct SchemaKeysCache {
    entries: FxHashMap<Rc<str>, Entry>,
}

#[derive(Debug)]
struct Entry {
    fingerprint: u64,
    keys: Rc<SchemaKeys>,
}

impl SchemaKeysCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The keys of the sub-schema `root` identified by `canonical_uri`, indexed
    /// on first use and again whenever `root` differs from what was indexed.
    pub fn get_or_index(&mut self, canonical_uri: &str, root: &Value) -> Rc<SchemaKeys> {
        let fingerprint = fingerprint(root);
        if let Some(entry) = self.entries.get(canonical_uri) {
            if entry.fingerprint == fingerprint {
                return entry.keys.clone();
            }
            debug!(schema = canonical_uri, "schema content changed, indexing again");
        }

        let keys = Rc::new(index_schema(root));
        debug!(schema = canonical_uri, locations = keys.len(), "indexed schema");
        self.entries.insert(canonical_uri.into(), Entry { fingerprint, keys: keys.clone() });
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sort keys of document nodes, by document location.
#[derive(Clone, Debug, Default, Deref)]
pub struct DocumentKeys(FxHashMap<Location, SortKey>);

impl DocumentKeys {
    /// Records `key` for `location` unless an earlier visit already did.
    ///
    /// Returns whether the key was recorded.
    pub fn record(&mut self, location: &Location, key: &SortKey) -> bool {
        if self.0.contains_key(location) {
            return false;
        }
        self.0.insert(location.clone(), key.clone());
        true
    }

    /// The key recorded for `location`, or [`SortKey::End`] if nothing visited it.
    pub fn key_of(&self, location: &Location) -> SortKey {
        self.0.get(location).cloned().unwrap_or(SortKey::End)
    }
}

/// Maps every document location visited in the trace below `root` to the sort
/// key of the schema location that visited it.
///
/// Nodes are visited in trace order, failing branches included, and the
/// earliest visit of a document location decides its key.
pub fn project(root: &TraceNode<'_>, cache: &mut SchemaKeysCache) -> Result<DocumentKeys, Error> {
    let mut keys = DocumentKeys::default();
    // one cache lookup per sub-schema and call
    let mut seen: FxHashMap<&str, Rc<SchemaKeys>> = FxHashMap::default();

    for node in root.iter() {
        let canonical_uri = node.schema
            .canonical_uri()
            .ok_or_else(|| Error::MissingCanonicalIdentity {
                schema_location: node.schema_location.clone(),
                instance_location: node.instance_location.clone(),
            })?;
        let schema_keys = seen
            .entry(canonical_uri)
            .or_insert_with(|| cache.get_or_index(canonical_uri, node.schema.root()));
        let key = schema_keys
            .get(&node.schema_location)
            .ok_or_else(|| Error::SchemaLocationNotFound {
                canonical_uri: canonical_uri.to_owned(),
                schema_location: node.schema_location.clone(),
            })?;

        if keys.record(&node.instance_location, key) {
            trace!(instance = %node.instance_location, %key, "projected");
        }
    }

    debug!(locations = keys.len(), schemas = cache.len(), "projected evaluation trace");
    Ok(keys)
}

/// Order-sensitive digest of a sub-schema's content.
fn fingerprint(schema: &Value) -> u64 {
    let mut hasher = FxHasher::default();
    schema.to_string().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_eval::{ Evaluator, SubSchema, Validator };
    use serde_json::json;

    fn location(pointer: &str, document: &Value) -> Location {
        Location::resolve_pointer(document, pointer).unwrap().0
    }

    #[test]
    fn test_record_first_write_wins() {
        let mut keys = DocumentKeys::default();
        let at = Location::root().join("a");
        assert!(keys.record(&at, &SortKey::Path(vec![2])));
        assert!(!keys.record(&at, &SortKey::Path(vec![1])));
        assert_eq!(keys.key_of(&at), SortKey::Path(vec![2]));
        assert_eq!(keys.key_of(&Location::root().join("b")), SortKey::End);
    }

    #[test]
    fn test_cache_indexes_once() {
        let schema = json!({ "type": "object" });
        let mut cache = SchemaKeysCache::new();
        let a = cache.get_or_index("urn:a", &schema);
        let b = cache.get_or_index("urn:a", &json!({ "type": "object" }));
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_indexes_changed_content_again() {
        let mut cache = SchemaKeysCache::new();
        let before = json!({ "properties": { "start": {}, "end": {} } });
        let after = json!({ "properties": { "end": {}, "start": {} } });

        let a = cache.get_or_index("https://example.com/range.json", &before);
        let b = cache.get_or_index("https://example.com/range.json", &after);
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let start = location("/properties/start", &after);
        assert_eq!(a.get(&start), Some(&SortKey::Path(vec![0, 0])));
        assert_eq!(b.get(&start), Some(&SortKey::Path(vec![0, 1])));

        let c = cache.get_or_index("https://example.com/range.json", &after);
        assert!(Rc::ptr_eq(&b, &c));
    }

    #[test]
    fn test_project() {
        let schema =
            json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "properties": {
                "start": { "type": "number" },
                "end": { "type": "number" }
            }
        });
        let document = json!({ "end": 2, "start": 1, "other": 3 });
        let evaluation = Evaluator::new().evaluate(&schema, &document).unwrap();

        let mut cache = SchemaKeysCache::new();
        let keys = project(&evaluation.root, &mut cache).unwrap();

        assert_eq!(keys.key_of(&Location::root()), SortKey::root());
        assert_eq!(keys.key_of(&location("/start", &document)), SortKey::Path(vec![1, 0]));
        assert_eq!(keys.key_of(&location("/end", &document)), SortKey::Path(vec![1, 1]));
        assert_eq!(keys.key_of(&location("/other", &document)), SortKey::End);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_project_failing_branch_first() {
        let schema =
            json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "anyOf": [
                { "properties": { "b": {}, "a": {} }, "required": ["missing"] },
                { "properties": { "a": {}, "b": {} } }
            ]
        });
        let document = json!({ "a": 1, "b": 2 });
        let evaluation = Evaluator::new().evaluate(&schema, &document).unwrap();
        assert!(evaluation.valid);

        let keys = project(&evaluation.root, &mut SchemaKeysCache::new()).unwrap();
        assert_eq!(keys.key_of(&location("/b", &document)), SortKey::Path(vec![1, 0, 0, 0]));
        assert_eq!(keys.key_of(&location("/a", &document)), SortKey::Path(vec![1, 0, 0, 1]));
    }

    #[test]
    fn test_project_without_identity() {
        let schema = json!({});
        let root = TraceNode {
            schema: SubSchema::new(None, &schema),
            schema_location: Location::root(),
            instance_location: Location::root(),
            keyword: None,
            valid: true,
            error: None,
            children: Vec::new(),
        };
        let result = project(&root, &mut SchemaKeysCache::new());
        assert!(matches!(result, Err(Error::MissingCanonicalIdentity { .. })));
    }

    #[test]
    fn test_project_unknown_location() {
        let schema = json!({});
        let root = TraceNode {
            schema: SubSchema::new(Some("urn:test".into()), &schema),
            schema_location: Location::root().join("properties"),
            instance_location: Location::root(),
            keyword: Some("properties"),
            valid: true,
            error: None,
            children: Vec::new(),
        };
        let result = project(&root, &mut SchemaKeysCache::new());
        assert!(matches!(result, Err(Error::SchemaLocationNotFound { .. })));
    }
}
