use derive_more::Deref;
use fxhash::FxHashMap;
use schema_eval::Location;
use serde_json::Value;

use crate::sort_key::SortKey;

/// Sort keys for every node of one schema resource, by location relative to its root.
#[derive(Clone, Debug, Default, Deref)]
pub struct SchemaKeys(FxHashMap<Location, SortKey>);

/// Assigns every node of `schema` a [`SortKey`] from its position of first appearance.
///
/// The schema is treated as plain JSON: object members are numbered in their
/// enumeration order, array items by index, and keywords are not interpreted.
pub fn index_schema(schema: &Value) -> SchemaKeys {
    let mut keys = FxHashMap::default();
    let mut stack = vec![(Location::root(), Vec::new(), schema)];

    while let Some((location, path, node)) = stack.pop() {
        match node {
            Value::Object(obj) => {
                for (index, (name, child)) in obj.iter().enumerate() {
                    stack.push((location.join(name.as_str()), extend(&path, index), child));
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    stack.push((location.join(index), extend(&path, index), child));
                }
            }
            _ => {}
        }
        keys.insert(location, SortKey::Path(path));
    }

    SchemaKeys(keys)
}

fn extend(path: &[usize], index: usize) -> Vec<usize> {
    let mut path = path.to_vec();
    path.push(index);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(keys: &SchemaKeys, pointer: &str, schema: &Value) -> Option<SortKey> {
        let (location, _) = Location::resolve_pointer(schema, pointer)?;
        keys.get(&location).cloned()
    }

    #[test]
    fn test_index_schema() {
        let schema =
            json!({
            "type": "object",
            "properties": {
                "start": { "type": "number" },
                "end": { "type": "number" }
            },
            "required": ["start", "end"]
        });
        let keys = index_schema(&schema);

        assert_eq!(keys.len(), 10);
        assert_eq!(key(&keys, "", &schema), Some(SortKey::root()));
        assert_eq!(key(&keys, "/type", &schema), Some(SortKey::Path(vec![0])));
        assert_eq!(key(&keys, "/properties/start", &schema), Some(SortKey::Path(vec![1, 0])));
        assert_eq!(key(&keys, "/properties/end", &schema), Some(SortKey::Path(vec![1, 1])));
        assert_eq!(key(&keys, "/properties/end/type", &schema), Some(SortKey::Path(vec![1, 1, 0])));
        assert_eq!(key(&keys, "/required/1", &schema), Some(SortKey::Path(vec![2, 1])));
    }

    #[test]
    fn test_index_leaf_schema() {
        let keys = index_schema(&json!(true));
        assert_eq!(keys.len(), 1);
        assert_eq!(keys.get(&Location::root()), Some(&SortKey::root()));

        let keys = index_schema(&json!({}));
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_keyword_names_are_not_interpreted() {
        let schema = json!({ "const": { "b": 1, "a": 2 } });
        let keys = index_schema(&schema);
        assert_eq!(key(&keys, "/const/a", &schema), Some(SortKey::Path(vec![0, 1])));
    }
}
