//! Content names: ordered sequences of opaque components.
//!
//! Names are written in URI form (`/file-name/%00%01`). A *segment name* is a
//! content name whose last component carries the segment marker.

mod component;

pub use component::{Component, SEGMENT_MARKER};

use std::fmt;
use std::str::FromStr;

/// Ordered sequence of name components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentName {
    components: Vec<Component>,
}

impl ContentName {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a URI-form name. An optional `ndn:` scheme is accepted; empty,
    /// `.` and `..` components are skipped.
    pub fn parse(uri: &str) -> Self {
        let body = uri.strip_prefix("ndn:").unwrap_or(uri);
        let components = body.split('/').filter_map(Component::from_escaped).collect();
        ContentName { components }
    }

    pub fn from_components(components: Vec<Component>) -> Self {
        ContentName { components }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }

    pub fn append(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn append_segment(self, segment: u64) -> Self {
        self.append(Component::from_segment(segment))
    }

    /// First `n` components.
    pub fn prefix(&self, n: usize) -> Self {
        ContentName {
            components: self.components[..n.min(self.components.len())].to_vec(),
        }
    }

    pub fn is_prefix_of(&self, other: &ContentName) -> bool {
        self.components.len() <= other.components.len()
            && self.components.iter().zip(&other.components).all(|(a, b)| a == b)
    }

    /// Segment number of the trailing component, if it is a segment.
    pub fn segment(&self) -> Option<u64> {
        self.components.last().and_then(Component::to_segment)
    }

    /// The name without its trailing segment component (unchanged if there is none).
    pub fn without_segment(&self) -> Self {
        if self.segment().is_some() {
            self.prefix(self.components.len() - 1)
        } else {
            self.clone()
        }
    }

    /// Name with the last component replaced by its successor. The empty
    /// name's successor is the single zero-byte component.
    pub fn successor(&self) -> Self {
        let mut components = self.components.clone();
        match components.pop() {
            Some(last) => components.push(last.successor()),
            None => components.push(Component::new(vec![0x00])),
        }
        ContentName { components }
    }
}

impl fmt::Display for ContentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for c in &self.components {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

impl FromStr for ContentName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ContentName::parse(s))
    }
}

impl From<&str> for ContentName {
    fn from(s: &str) -> Self {
        ContentName::parse(s)
    }
}
