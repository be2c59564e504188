//! Domain models for selectors, fields, and exported selections.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{SelectError, SelectResult};

/// Prefix marking a selector as relative to an anchor node.
pub const SCOPE_MARKER: &str = ":scope";

/// Message type carried by every export payload.
pub const EXPORT_MESSAGE_TYPE: &str = "FEED_DONE";

/// Named piece of data inside an item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum Field {
    Title,
    Date,
    Summary,
    Link,
    Image,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Title,
        Field::Date,
        Field::Summary,
        Field::Link,
        Field::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Date => "date",
            Field::Summary => "summary",
            Field::Link => "link",
            Field::Image => "image",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = FieldParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Field::Title),
            "date" | "pubdate" => Ok(Field::Date),
            "summary" | "description" => Ok(Field::Summary),
            "link" | "url" => Ok(Field::Link),
            "image" | "img" => Ok(Field::Image),
            other => Err(FieldParseError::UnknownField(other.to_string())),
        }
    }
}

/// Error returned when parsing a [`Field`] fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FieldParseError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
}

/// What a click means, as chosen by the operator in the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Item,
    Field(Field),
}

impl FromStr for Mode {
    type Err = FieldParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("item") {
            return Ok(Mode::Item);
        }
        value.parse().map(Mode::Field)
    }
}

/// What to do with field selectors when the item selector is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleFieldPolicy {
    /// Drop every field selector once the item selector changes.
    #[default]
    Clear,
    /// Leave field selectors untouched even though their anchor moved.
    Keep,
}

/// Selector evaluated from the document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AbsoluteSelector(String);

impl AbsoluteSelector {
    /// Validate a user supplied absolute selector.
    pub fn parse(value: &str) -> SelectResult<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SelectError::invalid(value, "empty selector"));
        }
        if trimmed.starts_with(SCOPE_MARKER) {
            return Err(SelectError::invalid(
                value,
                "scoped selectors cannot be queried from the document root",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Join segments ordered root to leaf with child combinators.
    pub(crate) fn from_segments(segments: &[String]) -> Self {
        Self(segments.join(" > "))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether any segment pins a structural position.
    pub fn has_index_segment(&self) -> bool {
        self.0.contains(":nth-of-type(")
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AbsoluteSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AbsoluteSelector {
    type Error = SelectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AbsoluteSelector> for String {
    fn from(value: AbsoluteSelector) -> Self {
        value.0
    }
}

/// Selector evaluated relative to an item container.
///
/// Always begins with [`SCOPE_MARKER`]. May end in `@attr` to name the attribute an extractor
/// should read instead of the text content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScopedSelector(String);

impl ScopedSelector {
    /// Selector matching the anchor itself.
    pub fn identity() -> Self {
        Self(SCOPE_MARKER.to_string())
    }

    /// Validate a user supplied scoped selector.
    pub fn parse(value: &str) -> SelectResult<Self> {
        let trimmed = value.trim();
        let Some(rest) = trimmed.strip_prefix(SCOPE_MARKER) else {
            return Err(SelectError::invalid(
                value,
                format!("scoped selectors must start with '{SCOPE_MARKER}'"),
            ));
        };
        if !rest.is_empty() && !rest.starts_with([' ', '>', '@']) {
            return Err(SelectError::invalid(
                value,
                format!("'{SCOPE_MARKER}' must be followed by a combinator"),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build from leaf-last segments. `descendant` joins the first segment with a descendant
    /// combinator instead of a child combinator.
    pub(crate) fn from_segments(segments: &[String], descendant: bool) -> Self {
        if segments.is_empty() {
            return Self::identity();
        }
        let combinator = if descendant { " " } else { " > " };
        Self(format!(
            "{SCOPE_MARKER}{combinator}{}",
            segments.join(" > ")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0 == SCOPE_MARKER
    }

    /// Split off a trailing `@attr` suffix, returning the queryable part and the attribute name.
    /// An escaped `\@` belongs to an identifier and never starts a suffix.
    pub fn split_attribute(&self) -> (ScopedSelector, Option<&str>) {
        if let Some((query, attr)) = self.0.rsplit_once('@')
            && !is_escaped_tail(query)
            && !attr.is_empty()
            && attr
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
        {
            let query = query.trim_end();
            let query = if query.is_empty() { SCOPE_MARKER } else { query };
            return (Self(query.to_string()), Some(attr));
        }
        (self.clone(), None)
    }
}

/// Whether the character following `prefix` is escaped, i.e. `prefix` ends in an odd run of
/// backslashes.
fn is_escaped_tail(prefix: &str) -> bool {
    prefix.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

impl fmt::Display for ScopedSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ScopedSelector {
    type Error = SelectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ScopedSelector> for String {
    fn from(value: ScopedSelector) -> Self {
        value.0
    }
}

/// Node geometry in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Finite coordinates and a positive area.
    pub fn is_renderable(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|value| value.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// Immutable snapshot of a selection session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selections {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<AbsoluteSelector>,
    #[serde(default)]
    pub fields: BTreeMap<Field, ScopedSelector>,
}

impl Selections {
    pub fn field(&self, field: Field) -> Option<&ScopedSelector> {
        self.fields.get(&field)
    }
}

/// Message handed to the export sink when the operator is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub selections: Selections,
    pub location: String,
}

impl ExportPayload {
    pub fn new(selections: Selections, location: impl Into<String>) -> Self {
        Self {
            kind: EXPORT_MESSAGE_TYPE.to_string(),
            selections,
            location: location.into(),
        }
    }
}
