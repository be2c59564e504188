//! Field selectors expressed relative to an item container.

use crate::app::builder::{ClassFilter, Strategy, render_segment};
use crate::app::inference::InferenceOptions;
use crate::domain::errors::{SelectError, SelectResult};
use crate::domain::model::ScopedSelector;
use crate::domain::tree::Tree;

/// Derive a scoped selector that leads from `container` to `descendant` and, applied to any
/// structurally equivalent container, to the corresponding node.
pub fn relative_selector<T: Tree>(
    tree: &T,
    container: T::Node,
    descendant: T::Node,
    options: &InferenceOptions,
) -> SelectResult<ScopedSelector> {
    relative_selector_with(
        tree,
        container,
        descendant,
        options.relative_depth,
        &options.class_filter,
    )
}

pub fn relative_selector_with<T: Tree>(
    tree: &T,
    container: T::Node,
    descendant: T::Node,
    max_depth: usize,
    filter: &ClassFilter,
) -> SelectResult<ScopedSelector> {
    if descendant == container {
        return Ok(ScopedSelector::identity());
    }
    if !tree.contains(container, descendant) {
        tracing::debug!(?container, ?descendant, "clicked node lies outside the container");
        return Err(SelectError::NoRelativeSelectorFound);
    }

    let mut segments = Vec::new();
    let mut current = descendant;
    let mut stopped_on_id = false;
    while current != container {
        if segments.len() >= max_depth {
            tracing::debug!(depth = max_depth, "relative walk exceeded depth");
            return Err(SelectError::NoRelativeSelectorFound);
        }
        let segment = render_segment(tree, current, Strategy::Anchored(filter));
        segments.push(segment.text);
        if segment.on_id {
            stopped_on_id = true;
            break;
        }
        current = tree
            .parent(current)
            .ok_or(SelectError::NoRelativeSelectorFound)?;
    }

    segments.reverse();
    Ok(ScopedSelector::from_segments(&segments, stopped_on_id))
}
