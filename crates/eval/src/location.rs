use std::fmt;

use serde_json::Value;

/// One step from a node to one of its children.
/// - `Property` is an object member, addressed by name.
/// - `Index` is an array element, addressed by position.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// A property name in an object.
    Property(String),
    /// An array index.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Property(name) => write!(f, "{}", name.replace('~', "~0").replace('/', "~1")),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(name: &str) -> Self {
        Segment::Property(name.to_owned())
    }
}

impl From<String> for Segment {
    fn from(name: String) -> Self {
        Segment::Property(name)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

/// A node's position within a tree, relative to some root.
///
/// Displays as an RFC 6901 JSON Pointer, so the root is the empty string
/// and `{"a": [{"b": 1}]}` holds `1` at `/a/0/b`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location(Vec<Segment>);

impl Location {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn push(&mut self, segment: impl Into<Segment>) {
        self.0.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.0.pop()
    }

    /// Returns a new location one level below this one.
    pub fn join(&self, segment: impl Into<Segment>) -> Self {
        let mut joined = self.clone();
        joined.push(segment);
        joined
    }

    /// Looks up the node this location addresses within `root`.
    pub fn get<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        self.0
            .iter()
            .try_fold(root, |current, segment| match (segment, current) {
                (Segment::Property(name), Value::Object(obj)) => obj.get(name),
                (Segment::Index(index), Value::Array(arr)) => arr.get(*index),
                _ => None,
            })
    }

    /// Resolves a JSON Pointer against `root`.
    ///
    /// Pointer tokens are untyped, so the value being walked decides whether a
    /// token is a property name or an array index. Returns `None` when the
    /// pointer is malformed or addresses nothing.
    pub fn resolve_pointer<'v>(root: &'v Value, pointer: &str) -> Option<(Self, &'v Value)> {
        if pointer.is_empty() {
            return Some((Self::root(), root));
        }

        let tokens = pointer.strip_prefix('/')?;
        let mut location = Self::root();
        let mut current = root;

        for token in tokens.split('/') {
            let token = token.replace("~1", "/").replace("~0", "~");
            match current {
                Value::Object(obj) => {
                    current = obj.get(&token)?;
                    location.push(token);
                }
                Value::Array(arr) => {
                    let index = token.parse::<usize>().ok()?;
                    current = arr.get(index)?;
                    location.push(index);
                }
                _ => {
                    return None;
                }
            }
        }

        Some((location, current))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromIterator<Segment> for Location {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Segment> for Location {
    fn extend<I: IntoIterator<Item = Segment>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}
