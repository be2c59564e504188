//! Match-count diagnostics driving the live preview.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::model::{BoundingBox, Field, Selections};
use crate::domain::tree::Tree;

/// Observational summary of how the current selections resolve against a tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Preview {
    /// Number of nodes matched by the item selector.
    pub item_count: usize,
    /// Total matches per field across all items.
    pub fields: BTreeMap<Field, usize>,
    /// Geometry of matched items the host could place on screen.
    pub item_boxes: Vec<BoundingBox>,
}

impl Preview {
    pub fn field_count(&self, field: Field) -> usize {
        self.fields.get(&field).copied().unwrap_or(0)
    }
}

/// Resolve every selector and count matches. Never fails: anything unresolvable counts zero.
pub fn compute_preview<T: Tree>(tree: &T, selections: &Selections) -> Preview {
    let mut preview = Preview {
        fields: selections.fields.keys().map(|&field| (field, 0)).collect(),
        ..Preview::default()
    };

    let Some(item) = &selections.item else {
        return preview;
    };
    let containers = match tree.query(item) {
        Ok(containers) => containers,
        Err(err) => {
            tracing::warn!(selector = %item, error = %err, "item selector unresolvable in preview");
            return preview;
        }
    };

    preview.item_count = containers.len();
    preview.item_boxes = containers
        .iter()
        .filter_map(|&node| tree.bounding_box(node))
        .filter(BoundingBox::is_renderable)
        .collect();

    for (field, selector) in &selections.fields {
        let (query, _) = selector.split_attribute();
        let mut total = 0;
        for &container in &containers {
            match tree.query_scoped(container, &query) {
                Ok(matches) => total += matches.len(),
                Err(err) => {
                    tracing::warn!(
                        %field,
                        selector = %selector,
                        error = %err,
                        "field selector unresolvable in preview"
                    );
                    total = 0;
                    break;
                }
            }
        }
        preview.fields.insert(*field, total);
    }

    preview
}

/// Handle identifying one preview recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PreviewTicket(u64);

/// Serializes preview recomputations: a result computed for an older ticket never replaces the
/// result of a newer one.
#[derive(Debug, Clone, Default)]
pub struct PreviewScheduler {
    issued: u64,
    applied: Option<u64>,
    latest: Option<Preview>,
}

impl PreviewScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a recomputation, superseding every ticket issued before.
    pub fn issue(&mut self) -> PreviewTicket {
        self.issued += 1;
        PreviewTicket(self.issued)
    }

    /// Record a finished recomputation. Returns `false` when a newer ticket superseded it.
    pub fn complete(&mut self, ticket: PreviewTicket, preview: Preview) -> bool {
        if ticket.0 != self.issued || self.applied.is_some_and(|applied| applied >= ticket.0) {
            tracing::debug!(ticket = ticket.0, latest = self.issued, "stale preview dropped");
            return false;
        }
        self.applied = Some(ticket.0);
        self.latest = Some(preview);
        true
    }

    pub fn latest(&self) -> Option<&Preview> {
        self.latest.as_ref()
    }

    /// Forget the last result; outstanding tickets become stale.
    pub fn reset(&mut self) {
        self.issued += 1;
        self.applied = None;
        self.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{AbsoluteSelector, ScopedSelector};
    use crate::app::inference::InferenceOptions;
    use crate::app::relative::relative_selector;
    use crate::infra::html::HtmlTree;

    const AT_SIGN_PAGE: &str = r#"<html><body><main>
        <div class="card"><h3 class="@container">A</h3><span id="mail@one">a@x</span></div>
        <div class="card"><h3 class="@container">B</h3><span id="mail@one">b@x</span></div>
    </main></body></html>"#;

    const PAGE: &str = r#"<html><body>
        <div class="card"><h3>A</h3><a href="/a">more</a></div>
        <div class="card"><h3>B</h3></div>
        <div class="card"><h3>C</h3><a href="/c">more</a></div>
    </body></html>"#;

    fn selections(item: &str, fields: &[(Field, &str)]) -> Selections {
        Selections {
            item: Some(AbsoluteSelector::parse(item).unwrap()),
            fields: fields
                .iter()
                .map(|(field, sel)| (*field, ScopedSelector::parse(sel).unwrap()))
                .collect(),
        }
    }

    #[test]
    fn counts_field_matches_across_items() {
        let tree = HtmlTree::parse_document(PAGE);
        let preview = compute_preview(
            &tree,
            &selections(
                "div.card",
                &[(Field::Title, ":scope > h3"), (Field::Link, ":scope > a@href")],
            ),
        );
        assert_eq!(preview.item_count, 3);
        assert_eq!(preview.field_count(Field::Title), 3);
        assert_eq!(preview.field_count(Field::Link), 2);
        assert!(preview.item_boxes.is_empty());
    }

    #[test]
    fn generated_selectors_with_escaped_at_signs_are_counted() {
        let tree = HtmlTree::parse_document(AT_SIGN_PAGE);
        let options = InferenceOptions::default();
        let card = tree.find("div.card").unwrap()[0];
        let title = relative_selector(&tree, card, tree.find("h3").unwrap()[0], &options).unwrap();
        let date =
            relative_selector(&tree, card, tree.find("span").unwrap()[0], &options).unwrap();
        assert_eq!(title.as_str(), r":scope > h3.\@container");
        assert_eq!(date.as_str(), r":scope span#mail\@one");

        let preview = compute_preview(
            &tree,
            &Selections {
                item: Some(AbsoluteSelector::parse("div.card").unwrap()),
                fields: [(Field::Title, title), (Field::Date, date)].into(),
            },
        );
        assert_eq!(preview.item_count, 2);
        assert_eq!(preview.field_count(Field::Title), 2);
        assert_eq!(preview.field_count(Field::Date), 2);
    }

    #[test]
    fn zero_items_report_zero_counts() {
        let tree = HtmlTree::parse_document(PAGE);
        let preview = compute_preview(
            &tree,
            &selections("section.none", &[(Field::Title, ":scope > h3")]),
        );
        assert_eq!(preview.item_count, 0);
        assert_eq!(preview.fields.get(&Field::Title), Some(&0));

        let empty = compute_preview(&tree, &Selections::default());
        assert_eq!(empty, Preview::default());
    }

    #[test]
    fn unresolvable_selectors_count_zero() {
        let tree = HtmlTree::parse_document(PAGE);
        let preview = compute_preview(
            &tree,
            &selections(
                "div.card",
                &[(Field::Title, ":scope > h3[["), (Field::Date, ":scope > time")],
            ),
        );
        assert_eq!(preview.item_count, 3);
        assert_eq!(preview.field_count(Field::Title), 0);
        assert_eq!(preview.field_count(Field::Date), 0);
    }

    #[test]
    fn reports_item_geometry_when_known() {
        let mut tree = HtmlTree::parse_document(PAGE);
        let first = tree.find_first("div.card").unwrap().unwrap();
        let bbox = BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 300.0,
            height: 80.0,
        };
        tree.set_bounding_box(first, bbox);

        let cards = tree.find("div.card").unwrap();
        let collapsed = BoundingBox {
            width: 0.0,
            ..bbox
        };
        let inverted = BoundingBox {
            height: -5.0,
            ..bbox
        };
        tree.set_bounding_box(cards[1], collapsed);
        tree.set_bounding_box(cards[2], inverted);

        let preview = compute_preview(&tree, &selections("div.card", &[]));
        assert_eq!(preview.item_boxes, vec![bbox]);
    }

    #[test]
    fn newer_tickets_supersede_older_ones() {
        let mut scheduler = PreviewScheduler::new();
        let first = scheduler.issue();
        let second = scheduler.issue();

        let newer = Preview {
            item_count: 2,
            ..Preview::default()
        };
        assert!(scheduler.complete(second, newer.clone()));
        assert!(!scheduler.complete(first, Preview::default()));
        assert_eq!(scheduler.latest(), Some(&newer));

        let third = scheduler.issue();
        scheduler.reset();
        assert!(!scheduler.complete(third, Preview::default()));
        assert_eq!(scheduler.latest(), None);
    }
}
