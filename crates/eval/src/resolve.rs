use std::{ hash::{ Hash, Hasher }, rc::Rc };

use fxhash::{ FxHashMap, FxHashSet, FxHasher };
use percent_encoding::percent_decode_str;
use serde_json::Value;
use url::Url;

use crate::{ error::Error, location::Location, trace::SubSchema };

/// Keywords whose values are instance data, never sub-schemas.
const DATA_KEYWORDS: &[&str] = &["const", "default", "enum", "examples"];

/// A resolved reference: the sub-schema to evaluate and the base URI in effect inside it.
pub(crate) struct Target<'s> {
    pub schema: SubSchema<'s>,
    pub base: Rc<str>,
}

/// Every schema resource and anchor reachable inside one schema document.
pub(crate) struct Registry<'s> {
    root_uri: Rc<str>,
    resources: FxHashMap<Rc<str>, &'s Value>,
    anchors: FxHashMap<String, Location>,
    /// `<resource>#<name>` of every `$dynamicAnchor`.
    dynamic_anchors: FxHashSet<String>,
}

impl<'s> Registry<'s> {
    pub fn build(schema: &'s Value) -> Self {
        let root_uri: Rc<str> = match schema.get("$id").and_then(Value::as_str) {
            Some(id) => normalize(strip_fragment(id)).into(),
            None => anonymous_uri(schema).into(),
        };

        let mut registry = Self {
            root_uri: root_uri.clone(),
            resources: FxHashMap::default(),
            anchors: FxHashMap::default(),
            dynamic_anchors: FxHashSet::default(),
        };
        registry.resources.insert(root_uri.clone(), schema);
        registry.collect(schema, &root_uri, Location::root());
        registry
    }

    pub fn root_uri(&self) -> &Rc<str> {
        &self.root_uri
    }

    pub fn root(&self) -> SubSchema<'s> {
        SubSchema::new(Some(self.root_uri.clone()), self.resources[&self.root_uri])
    }

    /// The root of the resource identified by `uri`.
    pub fn resource(&self, uri: &str) -> Option<&'s Value> {
        self.resources.get(uri).copied()
    }

    /// Whether the resource `uri` declares `$dynamicAnchor: <name>`.
    pub fn has_dynamic_anchor(&self, uri: &str, name: &str) -> bool {
        self.dynamic_anchors.contains(&format!("{uri}#{name}"))
    }

    fn collect(&mut self, value: &'s Value, base: &Rc<str>, location: Location) {
        let obj = match value {
            Value::Object(obj) => obj,
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.collect(item, base, location.join(index));
                }
                return;
            }
            _ => {
                return;
            }
        };

        let (base, location) = match obj.get("$id").and_then(Value::as_str) {
            Some(id) if !location.is_root() => {
                let id = strip_fragment(id);
                let uri: Rc<str> = join_uri(base, id).unwrap_or_else(|| id.to_owned()).into();
                self.resources.insert(uri.clone(), value);
                (uri, Location::root())
            }
            _ => (base.clone(), location),
        };

        if let Some(anchor) = obj.get("$anchor").and_then(Value::as_str) {
            self.anchors.insert(format!("{base}#{anchor}"), location.clone());
        }
        if let Some(anchor) = obj.get("$dynamicAnchor").and_then(Value::as_str) {
            self.anchors.insert(format!("{base}#{anchor}"), location.clone());
            self.dynamic_anchors.insert(format!("{base}#{anchor}"));
        }

        for (key, child) in obj {
            if !DATA_KEYWORDS.contains(&key.as_str()) {
                self.collect(child, &base, location.join(key.as_str()));
            }
        }
    }

    /// Resolves `reference` as written inside a schema whose base URI is `base`.
    pub fn resolve(&self, base: &str, reference: &str) -> Result<Target<'s>, Error> {
        let unresolved = || Error::UnresolvedReference { reference: reference.to_owned() };

        let (address, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let uri = join_uri(base, address).ok_or_else(unresolved)?;
        let (resource_uri, resource) = self.resources
            .get_key_value(uri.as_str())
            .ok_or_else(unresolved)?;
        let resource: &'s Value = *resource;

        let fragment = percent_decode_str(fragment)
            .decode_utf8()
            .map_err(|_| unresolved())?;
        let (location, root) = if fragment.is_empty() || fragment.starts_with('/') {
            Location::resolve_pointer(resource, &fragment).ok_or_else(unresolved)?
        } else {
            let location = self.anchors.get(&format!("{uri}#{fragment}")).ok_or_else(unresolved)?;
            (location.clone(), location.get(resource).ok_or_else(unresolved)?)
        };

        let canonical_uri: Rc<str> = if location.is_root() {
            resource_uri.clone()
        } else {
            format!("{resource_uri}#{location}").into()
        };

        Ok(Target {
            schema: SubSchema::new(Some(canonical_uri), root),
            base: resource_uri.clone(),
        })
    }
}

/// Identifies a schema without `$id` by its content, so that different
/// schemas never share an identity.
fn anonymous_uri(schema: &Value) -> String {
    let mut hasher = FxHasher::default();
    schema.to_string().hash(&mut hasher);
    format!("urn:schema-sort:{:016x}", hasher.finish())
}

pub(crate) fn strip_fragment(uri: &str) -> &str {
    uri.split_once('#').map_or(uri, |(address, _)| address)
}

/// The normalized form of an absolute URI; anything else is kept verbatim.
fn normalize(uri: &str) -> String {
    Url::parse(uri).map_or_else(|_| uri.to_owned(), String::from)
}

/// Resolves a URI reference against a base URI. `None` when neither yields an absolute URI.
pub(crate) fn join_uri(base: &str, reference: &str) -> Option<String> {
    if reference.is_empty() {
        return Some(base.to_owned());
    }
    let joined = match Url::parse(base) {
        Ok(base) => base.join(reference),
        Err(_) => Url::parse(reference),
    };
    joined.ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_uri() {
        let base = "https://example.com/schemas/root.json";
        let join = |base: &str, reference: &str| join_uri(base, reference).unwrap();
        assert_eq!(join(base, "range.json"), "https://example.com/schemas/range.json");
        assert_eq!(join(base, "../common/a.json"), "https://example.com/common/a.json");
        assert_eq!(join(base, "/abs.json"), "https://example.com/abs.json");
        assert_eq!(join(base, "//other.org/x.json"), "https://other.org/x.json");
        assert_eq!(join(base, "urn:example:thing"), "urn:example:thing");
        assert_eq!(join(base, ""), base);
        assert_eq!(join("https://example.com", "a.json"), "https://example.com/a.json");
        assert_eq!(join_uri("urn:schema-sort:0", "other.json"), None);
    }

    #[test]
    fn test_anonymous_uri_is_content_addressed() {
        let a = Registry::build(&json!({ "type": "object" })).root_uri().clone();
        let b = Registry::build(&json!({ "type": "object" })).root_uri().clone();
        let c = Registry::build(&json!({ "type": "array" })).root_uri().clone();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("urn:schema-sort:"));
    }

    #[test]
    fn test_resolve_pointer_reference() {
        let schema = json!({
            "$id": "https://example.com/root.json",
            "$defs": { "range": { "type": "object" } }
        });
        let registry = Registry::build(&schema);

        let target = registry.resolve(registry.root_uri(), "#/$defs/range").unwrap();
        assert_eq!(target.schema.canonical_uri(), Some("https://example.com/root.json#/$defs/range"));
        assert_eq!(target.schema.root(), &json!({ "type": "object" }));
        assert_eq!(&*target.base, "https://example.com/root.json");

        let target = registry.resolve(registry.root_uri(), "#").unwrap();
        assert_eq!(target.schema.canonical_uri(), Some("https://example.com/root.json"));
    }

    #[test]
    fn test_resolve_nested_resource_and_anchor() {
        let schema = json!({
            "$id": "https://example.com/root.json",
            "$defs": {
                "range": {
                    "$id": "range.json",
                    "properties": {
                        "start": { "$anchor": "start", "type": "number" }
                    }
                }
            }
        });
        let registry = Registry::build(&schema);

        let target = registry.resolve(registry.root_uri(), "range.json").unwrap();
        assert_eq!(target.schema.canonical_uri(), Some("https://example.com/range.json"));
        assert_eq!(&*target.base, "https://example.com/range.json");

        let target = registry.resolve("https://example.com/range.json", "#start").unwrap();
        assert_eq!(
            target.schema.canonical_uri(),
            Some("https://example.com/range.json#/properties/start")
        );
        assert_eq!(target.schema.root(), &json!({ "$anchor": "start", "type": "number" }));
    }

    #[test]
    fn test_resolve_percent_encoded_pointer() {
        let schema = json!({
            "$id": "https://example.com/root.json",
            "$defs": { "a b": { "type": "object" }, "c%d": { "type": "array" } }
        });
        let registry = Registry::build(&schema);

        let target = registry.resolve(registry.root_uri(), "#/$defs/a%20b").unwrap();
        assert_eq!(target.schema.root(), &json!({ "type": "object" }));
        assert_eq!(target.schema.canonical_uri(), Some("https://example.com/root.json#/$defs/a b"));

        let target = registry.resolve(registry.root_uri(), "#/$defs/c%25d").unwrap();
        assert_eq!(target.schema.root(), &json!({ "type": "array" }));
    }

    #[test]
    fn test_dynamic_anchors() {
        let schema = json!({
            "$id": "https://example.com/strict.json",
            "$dynamicAnchor": "node",
            "$defs": { "tree": { "$id": "tree.json", "$dynamicAnchor": "node", "$anchor": "plain" } }
        });
        let registry = Registry::build(&schema);
        assert!(registry.has_dynamic_anchor("https://example.com/strict.json", "node"));
        assert!(registry.has_dynamic_anchor("https://example.com/tree.json", "node"));
        assert!(!registry.has_dynamic_anchor("https://example.com/tree.json", "plain"));
        assert!(registry.resource("https://example.com/tree.json").is_some());
    }

    #[test]
    fn test_resolve_unknown() {
        let schema = json!({ "$defs": {} });
        let registry = Registry::build(&schema);
        assert!(
            matches!(
                registry.resolve(registry.root_uri(), "#/$defs/missing"),
                Err(Error::UnresolvedReference { .. })
            )
        );
        assert!(registry.resolve(registry.root_uri(), "https://elsewhere.org/s.json").is_err());
    }

    #[test]
    fn test_data_keywords_are_not_resources() {
        let schema = json!({
            "$id": "https://example.com/root.json",
            "const": { "$id": "https://example.com/not-a-schema.json" }
        });
        let registry = Registry::build(&schema);
        assert!(registry.resolve(registry.root_uri(), "not-a-schema.json").is_err());
    }
}
