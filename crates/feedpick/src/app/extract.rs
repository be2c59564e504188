//! Applying exported selections to a snapshot to pull out item data.

use serde::Serialize;
use time::OffsetDateTime;
use url::Url;

use crate::app::dates::parse_published;
use crate::domain::errors::{SelectError, SelectResult};
use crate::domain::model::{Field, ScopedSelector, Selections};
use crate::domain::tree::Tree;

/// Data pulled out of one item container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Date text as it appeared on the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub published: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Extract one record per item match. Items with neither a title nor a link are skipped.
pub fn extract_items<T: Tree>(
    tree: &T,
    selections: &Selections,
    base_url: Option<&Url>,
) -> SelectResult<Vec<ExtractedItem>> {
    let Some(item_selector) = &selections.item else {
        return Err(SelectError::ItemNotSelected);
    };

    let mut items = Vec::new();
    for (index, container) in tree.query(item_selector)?.into_iter().enumerate() {
        let mut item = ExtractedItem::default();
        for (&field, selector) in &selections.fields {
            let value = extract_field(tree, container, field, selector, base_url)?;
            match field {
                Field::Title => item.title = value,
                Field::Link => item.link = value,
                Field::Date => {
                    item.published = value.as_deref().and_then(parse_published);
                    item.date = value;
                }
                Field::Summary => item.summary = value,
                Field::Image => item.image = value,
            }
        }

        if item.summary.is_none() {
            item.summary = item.title.clone();
        }
        if item.title.is_none() && item.link.is_none() {
            tracing::warn!(index, "skipping item without title or link");
            continue;
        }
        items.push(item);
    }
    Ok(items)
}

fn extract_field<T: Tree>(
    tree: &T,
    container: T::Node,
    field: Field,
    selector: &ScopedSelector,
    base_url: Option<&Url>,
) -> SelectResult<Option<String>> {
    let (query, attr) = selector.split_attribute();
    let Some(node) = tree.query_scoped(container, &query)?.into_iter().next() else {
        return Ok(None);
    };

    let raw = match (attr, field) {
        (Some(name), _) => tree.attr(node, name).map(str::to_owned),
        (None, Field::Link) => link_target(tree, container, node)?,
        (None, Field::Image) => image_source(tree, node)?,
        (None, _) => Some(tree.text(node)),
    };
    let cleaned = raw
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    Ok(match field {
        Field::Link | Field::Image => cleaned.map(|value| resolve(&value, base_url)),
        _ => cleaned,
    })
}

/// `href` of the node itself, of the nearest enclosing anchor inside the item, or of the first
/// anchor beneath it.
fn link_target<T: Tree>(
    tree: &T,
    container: T::Node,
    node: T::Node,
) -> SelectResult<Option<String>> {
    let mut current = Some(node);
    while let Some(candidate) = current {
        if let Some(href) = tree.attr(candidate, "href") {
            return Ok(Some(href.to_owned()));
        }
        if candidate == container {
            break;
        }
        current = tree.parent(candidate);
    }

    let anchors = ScopedSelector::parse(":scope a[href]")?;
    Ok(tree
        .query_scoped(node, &anchors)?
        .into_iter()
        .find_map(|anchor| tree.attr(anchor, "href").map(str::to_owned)))
}

fn image_source<T: Tree>(tree: &T, node: T::Node) -> SelectResult<Option<String>> {
    let source = |img: T::Node| {
        tree.attr(img, "src")
            .filter(|src| !src.trim().is_empty())
            .or_else(|| tree.attr(img, "data-src"))
            .map(str::to_owned)
    };
    if tree.tag(node) == "img" {
        return Ok(source(node));
    }
    let images = ScopedSelector::parse(":scope img")?;
    Ok(tree
        .query_scoped(node, &images)?
        .into_iter()
        .find_map(source))
}

fn resolve(value: &str, base_url: Option<&Url>) -> String {
    match base_url.map(|base| base.join(value)) {
        Some(Ok(url)) => url.to_string(),
        Some(Err(err)) => {
            tracing::debug!(value, error = %err, "keeping unresolvable URL as-is");
            value.to_string()
        }
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::AbsoluteSelector;
    use crate::infra::html::HtmlTree;
    use time::macros::datetime;

    const PAGE: &str = r#"<html><body><main>
        <article class="post">
          <a class="title-link" href="/nieuws/een"><h2>Eerste bericht</h2></a>
          <time datetime="2024-02-01">01-02-2024</time>
          <p class="intro">  Korte   intro  </p>
          <div class="media"><img data-src="/img/1.jpg"></div>
        </article>
        <article class="post">
          <a class="title-link" href="https://other.example/twee"><h2>Tweede bericht</h2></a>
          <time datetime="2024-02-02">onbekend</time>
          <div class="media"><img src="/img/2.jpg"></div>
        </article>
        <article class="post"><span>advertentie</span></article>
    </main></body></html>"#;

    fn selections(fields: &[(Field, &str)]) -> Selections {
        Selections {
            item: Some(AbsoluteSelector::parse("article.post").unwrap()),
            fields: fields
                .iter()
                .map(|(field, sel)| (*field, ScopedSelector::parse(sel).unwrap()))
                .collect(),
        }
    }

    #[test]
    fn extracts_fields_per_item() {
        let tree = HtmlTree::parse_document(PAGE);
        let base = Url::parse("https://www.example.nl/nieuws/").unwrap();
        let items = extract_items(
            &tree,
            &selections(&[
                (Field::Title, ":scope > a.title-link > h2:nth-of-type(1)"),
                (Field::Link, ":scope > a.title-link > h2:nth-of-type(1)"),
                (Field::Date, ":scope > time:nth-of-type(1)"),
                (Field::Summary, ":scope > p.intro"),
                (Field::Image, ":scope > div.media"),
            ]),
            Some(&base),
        )
        .unwrap();

        assert_eq!(items.len(), 2);
        let first = &items[0];
        assert_eq!(first.title.as_deref(), Some("Eerste bericht"));
        assert_eq!(first.link.as_deref(), Some("https://www.example.nl/nieuws/een"));
        assert_eq!(first.date.as_deref(), Some("01-02-2024"));
        assert_eq!(first.published, Some(datetime!(2024-02-01 0:00 UTC)));
        assert_eq!(first.summary.as_deref(), Some("Korte intro"));
        assert_eq!(first.image.as_deref(), Some("https://www.example.nl/img/1.jpg"));

        let second = &items[1];
        assert_eq!(second.link.as_deref(), Some("https://other.example/twee"));
        assert_eq!(second.date.as_deref(), Some("onbekend"));
        assert_eq!(second.published, None);
        assert_eq!(second.summary.as_deref(), Some("Tweede bericht"));
    }

    #[test]
    fn attribute_suffix_reads_attributes() {
        let tree = HtmlTree::parse_document(PAGE);
        let items = extract_items(
            &tree,
            &selections(&[
                (Field::Title, ":scope h2"),
                (Field::Date, ":scope > time@datetime"),
            ]),
            None,
        )
        .unwrap();
        assert_eq!(items[1].date.as_deref(), Some("2024-02-02"));
        assert_eq!(items[1].published, Some(datetime!(2024-02-02 0:00 UTC)));
    }

    #[test]
    fn link_falls_back_to_descendant_anchor() {
        let tree = HtmlTree::parse_document(PAGE);
        let items = extract_items(&tree, &selections(&[(Field::Link, ":scope")]), None).unwrap();
        let links: Vec<_> = items.iter().filter_map(|item| item.link.as_deref()).collect();
        assert_eq!(links, vec!["/nieuws/een", "https://other.example/twee"]);
    }

    #[test]
    fn generated_selectors_with_escaped_at_signs_extract() {
        use crate::app::inference::InferenceOptions;
        use crate::app::relative::relative_selector;

        let tree = HtmlTree::parse_document(
            r#"<html><body><main>
              <div class="card"><h3 class="@container">A</h3><span id="mail@one">a@x</span></div>
              <div class="card"><h3 class="@container">B</h3><span id="mail@one">b@x</span></div>
            </main></body></html>"#,
        );
        let options = InferenceOptions::default();
        let card = tree.find("div.card").unwrap()[0];
        let title = relative_selector(&tree, card, tree.find("h3").unwrap()[0], &options).unwrap();
        let date =
            relative_selector(&tree, card, tree.find("span").unwrap()[0], &options).unwrap();

        let items = extract_items(
            &tree,
            &Selections {
                item: Some(AbsoluteSelector::parse("div.card").unwrap()),
                fields: [(Field::Title, title), (Field::Date, date)].into(),
            },
            None,
        )
        .unwrap();
        let pairs: Vec<_> = items
            .iter()
            .map(|item| (item.title.as_deref(), item.date.as_deref()))
            .collect();
        assert_eq!(pairs, vec![(Some("A"), Some("a@x")), (Some("B"), Some("b@x"))]);
    }

    #[test]
    fn requires_an_item_selector() {
        let tree = HtmlTree::parse_document(PAGE);
        let err = extract_items(&tree, &Selections::default(), None).unwrap_err();
        assert_eq!(err, SelectError::ItemNotSelected);
    }
}
