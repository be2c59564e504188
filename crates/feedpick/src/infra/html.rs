//! HTML snapshot adapter backed by `scraper`.

use std::collections::HashMap;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};

use crate::domain::errors::{SelectError, SelectResult};
use crate::domain::model::{AbsoluteSelector, BoundingBox, ScopedSelector};
use crate::domain::tree::Tree;

/// Parsed HTML document exposed through [`Tree`].
///
/// A static parse has no layout. Hosts that render the page (a browser bridge, a headless
/// snapshotter) can attach geometry per node with [`HtmlTree::set_bounding_box`].
#[derive(Debug)]
pub struct HtmlTree {
    document: Html,
    layout: HashMap<NodeId, BoundingBox>,
}

impl HtmlTree {
    pub fn parse_document(source: &str) -> Self {
        Self {
            document: Html::parse_document(source),
            layout: HashMap::new(),
        }
    }

    pub fn set_bounding_box(&mut self, node: NodeId, bbox: BoundingBox) {
        self.layout.insert(node, bbox);
    }

    /// Run a host-level CSS query, e.g. to locate the element under the pointer.
    pub fn find(&self, css: &str) -> SelectResult<Vec<NodeId>> {
        let selector = parse_selector(css)?;
        Ok(self.document.select(&selector).map(|el| el.id()).collect())
    }

    /// First element in document order matching `css`.
    pub fn find_first(&self, css: &str) -> SelectResult<Option<NodeId>> {
        Ok(self.find(css)?.into_iter().next())
    }

    fn element(&self, node: NodeId) -> Option<ElementRef<'_>> {
        self.document.tree.get(node).and_then(ElementRef::wrap)
    }
}

fn parse_selector(css: &str) -> SelectResult<Selector> {
    Selector::parse(css).map_err(|err| SelectError::invalid(css, err.to_string()))
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Tree for HtmlTree {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        self.document.root_element().id()
    }

    fn tag(&self, node: NodeId) -> &str {
        self.element(node)
            .map(|el| el.value().name())
            .unwrap_or_default()
    }

    fn id(&self, node: NodeId) -> Option<&str> {
        self.element(node)
            .and_then(|el| el.value().id())
            .filter(|id| !id.is_empty())
    }

    fn classes(&self, node: NodeId) -> Vec<&str> {
        self.element(node)
            .map(|el| el.value().classes().collect())
            .unwrap_or_default()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.element(node)
            .and_then(|el| el.parent())
            .and_then(ElementRef::wrap)
            .map(|el| el.id())
    }

    fn previous_siblings(&self, node: NodeId) -> Vec<NodeId> {
        self.element(node)
            .map(|el| {
                el.prev_siblings()
                    .filter_map(ElementRef::wrap)
                    .map(|sibling| sibling.id())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn query(&self, selector: &AbsoluteSelector) -> SelectResult<Vec<NodeId>> {
        self.find(selector.as_str())
    }

    fn query_scoped(&self, anchor: NodeId, selector: &ScopedSelector) -> SelectResult<Vec<NodeId>> {
        let Some(scope) = self.element(anchor) else {
            return Ok(Vec::new());
        };
        // `ElementRef::select` only walks descendants, so the bare marker is answered here.
        if selector.is_identity() {
            return Ok(vec![anchor]);
        }
        let parsed = parse_selector(selector.as_str())?;
        Ok(scope.select(&parsed).map(|el| el.id()).collect())
    }

    fn bounding_box(&self, node: NodeId) -> Option<BoundingBox> {
        self.layout.get(&node).copied()
    }

    fn text(&self, node: NodeId) -> String {
        self.element(node)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .unwrap_or_default()
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|el| el.value().attr(name))
    }
}
