use std::fmt;

use itertools::Itertools;

/// The canonical position of a node, compared lexicographically.
///
/// [`SortKey::End`] orders after every real key and stands for nodes that no
/// schema location claimed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SortKey {
    /// One enumeration index per level below the schema root.
    Path(Vec<usize>),
    End,
}

impl SortKey {
    pub fn root() -> Self {
        SortKey::Path(Vec::new())
    }

    /// The key of this node's `index`-th child. The end sentinel has no children.
    pub fn child(&self, index: usize) -> Option<Self> {
        match self {
            SortKey::Path(path) => {
                let mut path = path.clone();
                path.push(index);
                Some(SortKey::Path(path))
            }
            SortKey::End => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, SortKey::End)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Path(path) => write!(f, "({})", path.iter().join(", ")),
            SortKey::End => write!(f, "end"),
        }
    }
}
