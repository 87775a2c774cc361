use std::{ fmt, rc::Rc };

use serde_json::Value;

use crate::{ dialect::Dialect, location::Location };

/// A schema resource, or a referenced fragment of one, that trace nodes are evaluated against.
#[derive(Clone, Debug)]
pub struct SubSchema<'s> {
    canonical_uri: Option<Rc<str>>,
    root: &'s Value,
}

impl<'s> SubSchema<'s> {
    pub fn new(canonical_uri: Option<Rc<str>>, root: &'s Value) -> Self {
        Self { canonical_uri, root }
    }

    /// The stable identity of this sub-schema, if the validator assigned one.
    pub fn canonical_uri(&self) -> Option<&str> {
        self.canonical_uri.as_deref()
    }

    /// The sub-schema's own root node. Trace locations are relative to it.
    pub fn root(&self) -> &'s Value {
        self.root
    }
}

/// One schema or keyword application recorded while evaluating an instance.
///
/// Schema applications have `keyword == None`; their children are keyword
/// applications at the same instance location, whose children in turn are
/// the sub-schema applications the keyword performed, in the order performed.
/// Failing branches are kept.
#[derive(Clone, Debug)]
pub struct TraceNode<'s> {
    pub schema: SubSchema<'s>,
    pub schema_location: Location,
    pub instance_location: Location,
    pub keyword: Option<&'s str>,
    pub valid: bool,
    pub error: Option<String>,
    pub children: Vec<TraceNode<'s>>,
}

impl<'s> TraceNode<'s> {
    pub(crate) fn new(
        schema: &SubSchema<'s>,
        schema_location: Location,
        instance_location: &Location,
        keyword: Option<&'s str>
    ) -> Self {
        Self {
            schema: schema.clone(),
            schema_location,
            instance_location: instance_location.clone(),
            keyword,
            valid: true,
            error: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.error = Some(message.into());
    }

    /// Depth-first, pre-order walk over this node and all of its descendants.
    pub fn iter(&self) -> Iter<'_, 's> {
        Iter { stack: vec![self] }
    }
}

pub struct Iter<'t, 's> {
    stack: Vec<&'t TraceNode<'s>>,
}

impl<'t, 's> Iterator for Iter<'t, 's> {
    type Item = &'t TraceNode<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A failed assertion, as reported to users.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputUnit {
    pub instance_location: Location,
    pub keyword_location: String,
    pub message: String,
}

impl fmt::Display for OutputUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instance = if self.instance_location.is_root() {
            "/".to_string()
        } else {
            self.instance_location.to_string()
        };
        write!(f, "{instance}: {} (at {})", self.message, self.keyword_location)
    }
}

/// The outcome of evaluating one instance against one schema.
#[derive(Clone, Debug)]
pub struct Evaluation<'s> {
    pub dialect: Dialect,
    pub valid: bool,
    pub root: TraceNode<'s>,
}

impl Evaluation<'_> {
    /// Collects the failed assertions responsible for an invalid result.
    ///
    /// Only failing branches are descended into, so alternatives that lost a
    /// passing `anyOf` or `oneOf` are not reported.
    pub fn errors(&self) -> Vec<OutputUnit> {
        let mut errors = Vec::new();
        let mut stack = vec![&self.root];

        while let Some(node) = stack.pop() {
            if node.valid {
                continue;
            }
            if let Some(message) = &node.error {
                let uri = node.schema.canonical_uri().unwrap_or_default();
                errors.push(OutputUnit {
                    instance_location: node.instance_location.clone(),
                    keyword_location: format!("{uri}#{}", node.schema_location),
                    message: message.clone(),
                });
            }
            stack.extend(node.children.iter().rev());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node<'s>(schema: &SubSchema<'s>, at: &str, valid: bool) -> TraceNode<'s> {
        let mut node = TraceNode::new(schema, Location::root().join(at), &Location::root(), None);
        if !valid {
            node.fail(format!("{at} failed"));
        }
        node
    }

    #[test]
    fn test_iter_is_preorder() {
        let value = json!({});
        let schema = SubSchema::new(Some("urn:test".into()), &value);
        let mut root = node(&schema, "root", true);
        let mut a = node(&schema, "a", true);
        a.children.push(node(&schema, "a1", true));
        root.children.push(a);
        root.children.push(node(&schema, "b", true));

        let order = root
            .iter()
            .map(|n| n.schema_location.to_string())
            .collect::<Vec<_>>();
        assert_eq!(order, ["/root", "/a", "/a1", "/b"]);
    }

    #[test]
    fn test_errors_skip_passing_branches() {
        let value = json!({});
        let schema = SubSchema::new(Some("urn:test".into()), &value);
        let mut root = node(&schema, "root", false);
        root.error = None;
        let mut passing = node(&schema, "passing", true);
        passing.children.push(node(&schema, "hidden", false));
        root.children.push(passing);
        root.children.push(node(&schema, "shown", false));

        let evaluation = Evaluation { dialect: Dialect::Draft2020_12, valid: false, root };
        let errors = evaluation.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "shown failed");
        assert_eq!(errors[0].keyword_location, "urn:test#/shown");
        assert_eq!(errors[0].to_string(), "/: shown failed (at urn:test#/shown)");
    }
}
