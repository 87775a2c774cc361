use schema_eval::Location;
use serde_json::{ Map, Value };
use tracing::{ debug, trace };

use crate::{ Options, projector::DocumentKeys, sort_key::SortKey };

/// A document node annotated with the sort key its location was given.
#[derive(Debug)]
struct Annotated<'d> {
    key: SortKey,
    node: Node<'d>,
}

#[derive(Debug)]
enum Node<'d> {
    Leaf(&'d Value),
    Array(Vec<Annotated<'d>>),
    Object(Vec<(&'d str, Annotated<'d>)>),
}

fn annotate<'d>(value: &'d Value, location: &mut Location, keys: &DocumentKeys) -> Annotated<'d> {
    let key = keys.key_of(location);
    let node = match value {
        Value::Array(items) => {
            let mut children = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                location.push(index);
                children.push(annotate(item, location, keys));
                location.pop();
            }
            Node::Array(children)
        }
        Value::Object(obj) => {
            let mut children = Vec::with_capacity(obj.len());
            for (name, item) in obj {
                location.push(name.as_str());
                children.push((name.as_str(), annotate(item, location, keys)));
                location.pop();
            }
            Node::Object(children)
        }
        _ => Node::Leaf(value),
    };
    Annotated { key, node }
}

struct Rewriter {
    options: Options,
    pruned: usize,
}

impl Rewriter {
    fn rewrite(&mut self, annotated: Annotated<'_>) -> Value {
        match annotated.node {
            Node::Leaf(value) => value.clone(),
            Node::Array(items) => {
                Value::Array(
                    items
                        .into_iter()
                        .map(|item| self.rewrite(item))
                        .collect()
                )
            }
            Node::Object(properties) => {
                let mut retained = Vec::with_capacity(properties.len());
                for (name, child) in properties {
                    if self.options.remove_additional_props && child.key.is_end() {
                        trace!(property = name, "pruned");
                        self.pruned += 1;
                        continue;
                    }
                    let key = child.key.clone();
                    retained.push((key, name, self.rewrite(child)));
                }

                if self.options.sort {
                    // names are unique within an object, so the order is total
                    retained.sort_by(|(a_key, a_name, _), (b_key, b_name, _)| {
                        a_key.cmp(b_key).then_with(|| a_name.cmp(b_name))
                    });
                }

                Value::Object(
                    retained
                        .into_iter()
                        .map(|(_, name, value)| (name.to_owned(), value))
                        .collect::<Map<_, _>>()
                )
            }
        }
    }
}

/// Builds a reordered, and optionally pruned, copy of `document`.
///
/// With [`Options::sort`], object members are ordered by their sort key and
/// then by name, so members no schema location claimed come last in name
/// order. With [`Options::remove_additional_props`], those members are
/// dropped instead. Array items keep their positions. `document` itself is
/// never modified.
pub fn rewrite(document: &Value, keys: &DocumentKeys, options: Options) -> Value {
    let annotated = annotate(document, &mut Location::root(), keys);
    let mut rewriter = Rewriter { options, pruned: 0 };
    let rewritten = rewriter.rewrite(annotated);
    debug!(pruned = rewriter.pruned, sorted = options.sort, "rewrote document");
    rewritten
}
