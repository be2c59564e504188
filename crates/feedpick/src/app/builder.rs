//! Rendering nodes into candidate selector strings.

use crate::domain::model::AbsoluteSelector;
use crate::domain::tree::Tree;

/// Class prefixes that usually carry framework or UI state rather than meaning.
pub const DEFAULT_IGNORED_CLASS_PREFIXES: [&str; 4] = ["ng-", "js-", "is-", "has-"];

/// At most this many class names make it into one segment.
const MAX_CLASSES_PER_SEGMENT: usize = 3;

/// Heuristic filter deciding which class names may anchor a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFilter {
    ignored_prefixes: Vec<String>,
}

impl ClassFilter {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored_prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|prefix: &String| !prefix.is_empty())
                .collect(),
        }
    }

    /// Filter that keeps every class.
    pub fn keep_all() -> Self {
        Self {
            ignored_prefixes: Vec::new(),
        }
    }

    pub fn keeps(&self, class: &str) -> bool {
        !self
            .ignored_prefixes
            .iter()
            .any(|prefix| class.starts_with(prefix.as_str()))
    }
}

impl Default for ClassFilter {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_CLASS_PREFIXES)
    }
}

/// How a single level of the walk is rendered.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Strategy<'a> {
    /// id, else classes, else structural index.
    Anchored(&'a ClassFilter),
    /// id, else structural index.
    Structural,
}

/// One rendered level of an ancestor chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub text: String,
    pub on_id: bool,
}

pub(crate) fn render_segment<T: Tree>(tree: &T, node: T::Node, strategy: Strategy<'_>) -> Segment {
    let tag = tree.tag(node);
    if let Some(id) = tree.id(node) {
        return Segment {
            text: format!("{tag}#{}", escape_identifier(id)),
            on_id: true,
        };
    }

    if let Strategy::Anchored(filter) = strategy {
        let classes: Vec<String> = tree
            .classes(node)
            .into_iter()
            .filter(|class| filter.keeps(class))
            .take(MAX_CLASSES_PER_SEGMENT)
            .map(escape_identifier)
            .collect();
        if !classes.is_empty() {
            return Segment {
                text: format!("{tag}.{}", classes.join(".")),
                on_id: false,
            };
        }
    }

    Segment {
        text: format!("{tag}:nth-of-type({})", nth_of_type(tree, node)),
        on_id: false,
    }
}

/// 1-based position among preceding siblings sharing the tag.
pub(crate) fn nth_of_type<T: Tree>(tree: &T, node: T::Node) -> usize {
    let tag = tree.tag(node);
    1 + tree
        .previous_siblings(node)
        .into_iter()
        .filter(|sibling| tree.tag(*sibling) == tag)
        .count()
}

/// Class-anchored selector for `node`: walks toward the root for at most `max_depth` levels,
/// stopping early on the first id.
pub fn build_anchored_selector<T: Tree>(
    tree: &T,
    node: T::Node,
    max_depth: usize,
    filter: &ClassFilter,
) -> AbsoluteSelector {
    walk_to_root(tree, node, max_depth, Strategy::Anchored(filter))
}

/// Position-only selector for `node`. Brittle against content changes but defined for any node.
pub fn build_structural_selector<T: Tree>(
    tree: &T,
    node: T::Node,
    max_depth: usize,
) -> AbsoluteSelector {
    walk_to_root(tree, node, max_depth, Strategy::Structural)
}

fn walk_to_root<T: Tree>(
    tree: &T,
    node: T::Node,
    max_depth: usize,
    strategy: Strategy<'_>,
) -> AbsoluteSelector {
    let mut segments = Vec::new();
    let mut current = Some(node);
    while let Some(level) = current {
        if segments.len() >= max_depth.max(1) {
            break;
        }
        let segment = render_segment(tree, level, strategy);
        segments.push(segment.text);
        if segment.on_id {
            break;
        }
        current = tree.parent(level);
    }
    segments.reverse();
    AbsoluteSelector::from_segments(&segments)
}

/// Serialize an identifier so it survives selector parsing unchanged (CSSOM `CSS.escape`).
pub fn escape_identifier(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len());
    for (index, &ch) in chars.iter().enumerate() {
        match ch {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1f}' | '\u{7f}' => push_code_point(&mut out, ch),
            '0'..='9' if index == 0 || (index == 1 && chars[0] == '-') => {
                push_code_point(&mut out, ch)
            }
            '-' if index == 0 && chars.len() == 1 => out.push_str("\\-"),
            c if c >= '\u{80}' || c == '-' || c == '_' || c.is_ascii_alphanumeric() => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

fn push_code_point(out: &mut String, ch: char) {
    out.push_str(&format!("\\{:x} ", ch as u32));
}
