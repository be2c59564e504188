//! Generalizing a clicked node to the repeating container it belongs to.

use std::collections::HashSet;

use serde::Serialize;

use crate::app::builder::{ClassFilter, build_anchored_selector, build_structural_selector};
use crate::domain::errors::{SelectError, SelectResult};
use crate::domain::model::AbsoluteSelector;
use crate::domain::tree::Tree;
use crate::infra::config::Config;

/// Tunables for candidate generation, validation, and scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceOptions {
    /// Levels walked by the selector builder.
    pub max_depth: usize,
    /// Ancestors of the click that contribute class-anchored candidates.
    pub class_depth: usize,
    /// Ancestors of the click that contribute structural candidates.
    pub structural_depth: usize,
    /// Deepest descendant-to-container walk for field selectors.
    pub relative_depth: usize,
    pub min_matches: usize,
    pub max_matches: usize,
    /// Bonus for candidates without a structural-index segment.
    pub unindexed_bonus: i64,
    /// Match counts above this add nothing to the score.
    pub match_bonus_cap: usize,
    pub class_filter: ClassFilter,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            max_depth: 8,
            class_depth: 6,
            structural_depth: 4,
            relative_depth: 8,
            min_matches: 2,
            max_matches: 400,
            unindexed_bonus: 1500,
            match_bonus_cap: 100,
            class_filter: ClassFilter::default(),
        }
    }
}

impl InferenceOptions {
    /// Build options from configuration.
    pub fn from_config(config: &Config) -> Self {
        let inference = &config.inference;
        Self {
            max_depth: inference.max_depth,
            class_depth: inference.class_depth,
            structural_depth: inference.structural_depth,
            relative_depth: inference.relative_depth,
            min_matches: inference.min_matches.max(2),
            max_matches: inference.max_matches.max(inference.min_matches.max(2)),
            unindexed_bonus: inference.unindexed_bonus,
            match_bonus_cap: inference.match_bonus_cap,
            class_filter: ClassFilter::new(config.classes.ignore_prefixes.iter().cloned()),
        }
    }

    fn accepts_count(&self, count: usize) -> bool {
        (self.min_matches..=self.max_matches).contains(&count)
    }
}

/// Winning selector for a repeated item family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerMatch {
    pub selector: AbsoluteSelector,
    pub match_count: usize,
}

/// A generated selector evaluated against the current tree.
#[derive(Debug, Clone)]
struct Candidate {
    selector: AbsoluteSelector,
    match_count: usize,
    contains_target: bool,
}

impl Candidate {
    fn evaluate<T: Tree>(tree: &T, selector: AbsoluteSelector, target: T::Node) -> Option<Self> {
        match tree.query(&selector) {
            Ok(matches) => {
                let contains_target = matches.iter().any(|&node| tree.contains(node, target));
                Some(Self {
                    selector,
                    match_count: matches.len(),
                    contains_target,
                })
            }
            Err(err) => {
                tracing::warn!(selector = %selector, error = %err, "generated selector rejected");
                None
            }
        }
    }

    fn viable(&self, options: &InferenceOptions) -> bool {
        options.accepts_count(self.match_count) && self.contains_target
    }

    fn into_match(self) -> ContainerMatch {
        ContainerMatch {
            selector: self.selector,
            match_count: self.match_count,
        }
    }
}

/// Preference order among viable candidates: unindexed beats indexed, then shorter beats longer,
/// with a capped nudge toward larger families.
pub fn score(selector: &AbsoluteSelector, match_count: usize, options: &InferenceOptions) -> i64 {
    let bonus = if selector.has_index_segment() {
        0
    } else {
        options.unindexed_bonus
    };
    bonus - selector.len() as i64 + match_count.min(options.match_bonus_cap) as i64
}

/// Infer the selector describing the repeated item that `clicked` belongs to.
pub fn infer_container<T: Tree>(
    tree: &T,
    clicked: T::Node,
    options: &InferenceOptions,
) -> SelectResult<ContainerMatch> {
    let mut best: Option<(i64, Candidate)> = None;
    for selector in candidate_pool(tree, clicked, options) {
        let Some(candidate) = Candidate::evaluate(tree, selector, clicked) else {
            continue;
        };
        if !candidate.viable(options) {
            tracing::trace!(
                selector = %candidate.selector,
                matches = candidate.match_count,
                contains = candidate.contains_target,
                "candidate discarded"
            );
            continue;
        }
        let value = score(&candidate.selector, candidate.match_count, options);
        tracing::debug!(
            selector = %candidate.selector,
            matches = candidate.match_count,
            score = value,
            "candidate kept"
        );
        if best.as_ref().is_none_or(|(top, _)| value > *top) {
            best = Some((value, candidate));
        }
    }

    if let Some((_, winner)) = best {
        return Ok(winner.into_match());
    }

    tracing::debug!("no scored candidate survived, walking ancestors");
    fallback_walk(tree, clicked, options)
}

/// Distinct candidates in generation order: class-anchored for the click and its nearest
/// ancestors, then structural ones.
fn candidate_pool<T: Tree>(
    tree: &T,
    clicked: T::Node,
    options: &InferenceOptions,
) -> Vec<AbsoluteSelector> {
    let lineage: Vec<T::Node> = std::iter::once(clicked)
        .chain(tree.ancestors(clicked))
        .collect();

    let anchored = lineage
        .iter()
        .take(options.class_depth + 1)
        .map(|&node| build_anchored_selector(tree, node, options.max_depth, &options.class_filter));
    let structural = lineage
        .iter()
        .take(options.structural_depth + 1)
        .map(|&node| build_structural_selector(tree, node, options.max_depth));

    let mut seen = HashSet::new();
    anchored
        .chain(structural)
        .filter(|selector| seen.insert(selector.as_str().to_owned()))
        .collect()
}

fn fallback_walk<T: Tree>(
    tree: &T,
    clicked: T::Node,
    options: &InferenceOptions,
) -> SelectResult<ContainerMatch> {
    let lineage = std::iter::once(clicked).chain(tree.ancestors(clicked));
    for node in lineage {
        let attempts = [
            build_anchored_selector(tree, node, options.max_depth, &options.class_filter),
            build_structural_selector(tree, node, options.max_depth),
        ];
        for selector in attempts {
            if let Some(candidate) = Candidate::evaluate(tree, selector, clicked)
                && candidate.viable(options)
            {
                tracing::debug!(
                    selector = %candidate.selector,
                    matches = candidate.match_count,
                    "fallback ancestor accepted"
                );
                return Ok(candidate.into_match());
            }
        }
    }
    Err(SelectError::NoRepeatingContainerFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::html::HtmlTree;

    fn cards(count: usize) -> String {
        let cards: String = (1..=count)
            .map(|n| {
                format!(
                    r#"<div class="card"><h3 class="headline">Story {n}</h3><span class="date">2024-01-0{}</span></div>"#,
                    n % 9 + 1
                )
            })
            .collect();
        format!("<html><body><main>{cards}</main><footer><p>bye</p></footer></body></html>")
    }

    #[test]
    fn generalizes_card_click_to_all_cards() {
        let tree = HtmlTree::parse_document(&cards(5));
        let second = tree.find("div.card").unwrap()[1];

        let found = infer_container(&tree, second, &InferenceOptions::default()).unwrap();
        assert_eq!(found.match_count, 5);
        let matches = tree.query(&found.selector).unwrap();
        assert!(matches.contains(&second));
    }

    #[test]
    fn headline_click_climbs_to_the_card() {
        let tree = HtmlTree::parse_document(&cards(5));
        let headline = tree.find("h3.headline").unwrap()[3];
        let card = tree.parent(headline).unwrap();

        let found = infer_container(&tree, headline, &InferenceOptions::default()).unwrap();
        assert!(found.selector.as_str().ends_with("div.card"));
        assert!(tree.query(&found.selector).unwrap().contains(&card));
    }

    #[test]
    fn unindexed_candidates_win() {
        let html = r#"<html><body><ul id="feed">
            <li class="item"><a>1</a></li><li class="item"><a>2</a></li><li class="item"><a>3</a></li>
        </ul></body></html>"#;
        let tree = HtmlTree::parse_document(html);
        let link = tree.find("a").unwrap()[2];

        let found = infer_container(&tree, link, &InferenceOptions::default()).unwrap();
        assert_eq!(found.selector.as_str(), "ul#feed > li.item");
        assert_eq!(found.match_count, 3);
    }

    #[test]
    fn score_prefers_unindexed_then_short() {
        let options = InferenceOptions::default();
        let unindexed =
            AbsoluteSelector::parse("body.home > main.list > div.a-rather-long-card-name").unwrap();
        let indexed = AbsoluteSelector::parse("div:nth-of-type(2)").unwrap();
        assert!(score(&unindexed, 2, &options) > score(&indexed, 400, &options));

        let short = AbsoluteSelector::parse("ul#x > li.a").unwrap();
        let long = AbsoluteSelector::parse("ul#x > li.a.b").unwrap();
        assert!(score(&short, 10, &options) > score(&long, 10, &options));
        assert_eq!(score(&short, 500, &options), score(&short, 100, &options));
    }

    #[test]
    fn too_broad_candidates_are_discarded() {
        let tree = HtmlTree::parse_document(&cards(5));
        let second = tree.find("div.card").unwrap()[1];
        let options = InferenceOptions {
            max_matches: 4,
            ..InferenceOptions::default()
        };

        let err = infer_container(&tree, second, &options).unwrap_err();
        assert_eq!(err, SelectError::NoRepeatingContainerFound);
    }

    #[test]
    fn singleton_click_has_no_container() {
        let tree = HtmlTree::parse_document(
            "<html><body><article><p>only</p></article></body></html>",
        );
        let paragraph = tree.find_first("p").unwrap().unwrap();
        let err = infer_container(&tree, paragraph, &InferenceOptions::default()).unwrap_err();
        assert_eq!(err, SelectError::NoRepeatingContainerFound);
    }

    #[test]
    fn fallback_reaches_beyond_candidate_depth() {
        let html = r#"<html><body>
            <div class="row"><p id="first">a</p></div>
            <div class="row"><p id="second">b</p></div>
        </body></html>"#;
        let tree = HtmlTree::parse_document(html);
        let paragraph = tree.find_first("p#second").unwrap().unwrap();
        let options = InferenceOptions {
            class_depth: 0,
            structural_depth: 0,
            ..InferenceOptions::default()
        };

        let found = infer_container(&tree, paragraph, &options).unwrap();
        assert_eq!(found.match_count, 2);
        assert!(found.selector.as_str().ends_with("div.row"));
    }
}
