//! Capability set every queried document must expose.

use std::fmt::Debug;
use std::hash::Hash;

use crate::domain::errors::SelectResult;
use crate::domain::model::{AbsoluteSelector, BoundingBox, ScopedSelector};

/// Read-only view over an element tree.
///
/// Inference and the session only ever talk to this trait. Nodes are cheap handles owned by the
/// tree; the core never keeps them beyond a single interaction.
pub trait Tree {
    type Node: Copy + Eq + Hash + Debug;

    /// The root element (`<html>` for documents).
    fn root(&self) -> Self::Node;

    /// Lower-case tag name.
    fn tag(&self, node: Self::Node) -> &str;

    /// Non-empty id attribute, if any.
    fn id(&self, node: Self::Node) -> Option<&str>;

    /// Class names in attribute order.
    fn classes(&self, node: Self::Node) -> Vec<&str>;

    /// Parent element; `None` above the root element.
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    /// Element siblings before `node`, nearest first.
    fn previous_siblings(&self, node: Self::Node) -> Vec<Self::Node>;

    /// Evaluate an absolute selector from the document root.
    fn query(&self, selector: &AbsoluteSelector) -> SelectResult<Vec<Self::Node>>;

    /// Evaluate a scoped selector with `anchor` as the scope element.
    fn query_scoped(
        &self,
        anchor: Self::Node,
        selector: &ScopedSelector,
    ) -> SelectResult<Vec<Self::Node>>;

    /// Rendered geometry, when the host knows it.
    fn bounding_box(&self, node: Self::Node) -> Option<BoundingBox>;

    /// Text content with whitespace runs collapsed.
    fn text(&self, node: Self::Node) -> String;

    fn attr(&self, node: Self::Node, name: &str) -> Option<&str>;

    /// Whether `node` is `ancestor` or lies beneath it.
    fn contains(&self, ancestor: Self::Node, node: Self::Node) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.parent(candidate);
        }
        false
    }

    /// Ancestors of `node`, nearest first, excluding `node`.
    fn ancestors(&self, node: Self::Node) -> Vec<Self::Node> {
        let mut chain = Vec::new();
        let mut current = self.parent(node);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parent(parent);
        }
        chain
    }
}
