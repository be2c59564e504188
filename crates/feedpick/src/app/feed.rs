//! Rendering extracted items as RSS 2.0 or JSON Feed documents.

use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use minijinja::{AutoEscape, Environment};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::{Rfc2822, Rfc3339};

use crate::app::extract::ExtractedItem;
use crate::infra::config::Config;

const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1";

/// Supported feed formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum FeedFormat {
    /// RSS 2.0 XML document.
    Rss,
    /// JSON Feed version 1.
    Json,
}

impl FeedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedFormat::Rss => "rss",
            FeedFormat::Json => "json",
        }
    }

    /// Recommended file extension for the format.
    pub fn extension(&self) -> &'static str {
        match self {
            FeedFormat::Rss => "xml",
            FeedFormat::Json => "json",
        }
    }
}

impl FromStr for FeedFormat {
    type Err = FeedFormatParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rss" | "xml" | "rss2" => Ok(FeedFormat::Rss),
            "json" | "jsonfeed" | "json-feed" => Ok(FeedFormat::Json),
            other => Err(FeedFormatParseError::UnknownFormat(other.to_string())),
        }
    }
}

/// Error returned when parsing a [`FeedFormat`] fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FeedFormatParseError {
    #[error("unknown feed format '{0}'")]
    UnknownFormat(String),
}

/// Channel-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMeta {
    pub title: String,
    /// Page the items were scraped from.
    pub link: String,
    pub description: String,
    pub language: Option<String>,
    /// Where the rendered feed itself will be published.
    pub feed_url: Option<String>,
}

impl FeedMeta {
    /// Build metadata from configuration defaults for the given source page.
    pub fn from_config(config: &Config, link: impl Into<String>) -> Self {
        let language = config.feed.language();
        Self {
            title: config.feed.title(),
            link: link.into(),
            description: config.feed.description(),
            language: (!language.is_empty()).then_some(language),
            feed_url: None,
        }
    }
}

/// Renders feeds from extracted items.
pub struct FeedRenderer {
    env: Environment<'static>,
}

impl FeedRenderer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            env: default_environment()?,
        })
    }

    pub fn render(
        &self,
        meta: &FeedMeta,
        items: &[ExtractedItem],
        format: FeedFormat,
    ) -> Result<String> {
        match format {
            FeedFormat::Rss => self.render_rss(meta, items),
            FeedFormat::Json => render_json_feed(meta, items),
        }
    }

    fn render_rss(&self, meta: &FeedMeta, items: &[ExtractedItem]) -> Result<String> {
        let entries: Vec<RssEntry> = items
            .iter()
            .map(|item| RssEntry {
                title: item.title.clone().unwrap_or_default(),
                link: item.link.clone(),
                description: item.summary.clone(),
                pub_date: item.published.and_then(|published| {
                    published
                        .format(&Rfc2822)
                        .inspect_err(|err| tracing::warn!(error = %err, "unformattable pubDate"))
                        .ok()
                }),
                guid: item.link.clone(),
                image: item.image.clone(),
            })
            .collect();

        let context = RssContext {
            title: &meta.title,
            link: &meta.link,
            description: &meta.description,
            language: meta.language.as_deref(),
            items: entries,
        };
        self.env
            .get_template("rss")
            .and_then(|template| template.render(&context))
            .map_err(|err| anyhow!("failed to render RSS feed: {err}"))
    }
}

fn default_environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.add_filter("xml", escape_xml);
    env.add_template("rss", RSS_TEMPLATE)
        .map_err(|err| anyhow!("failed to register RSS template: {err}"))?;
    Ok(env)
}

/// Escape the five XML special characters.
pub fn escape_xml(value: String) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn render_json_feed(meta: &FeedMeta, items: &[ExtractedItem]) -> Result<String> {
    let feed = JsonFeed {
        version: JSON_FEED_VERSION,
        title: &meta.title,
        home_page_url: &meta.link,
        feed_url: meta.feed_url.as_deref(),
        description: (!meta.description.is_empty()).then_some(meta.description.as_str()),
        items: items
            .iter()
            .enumerate()
            .map(|(index, item)| JsonFeedItem {
                id: item.link.clone().unwrap_or_else(|| index.to_string()),
                url: item.link.as_deref(),
                title: item.title.as_deref(),
                content_text: item.summary.as_deref().unwrap_or_default(),
                image: item.image.as_deref(),
                date_published: item
                    .published
                    .and_then(|published| published.format(&Rfc3339).ok()),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&feed).context("failed to serialize JSON feed")
}

#[derive(Serialize)]
struct RssContext<'a> {
    title: &'a str,
    link: &'a str,
    description: &'a str,
    language: Option<&'a str>,
    items: Vec<RssEntry>,
}

#[derive(Serialize)]
struct RssEntry {
    title: String,
    link: Option<String>,
    description: Option<String>,
    pub_date: Option<String>,
    guid: Option<String>,
    image: Option<String>,
}

#[derive(Serialize)]
struct JsonFeed<'a> {
    version: &'static str,
    title: &'a str,
    home_page_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    feed_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    items: Vec<JsonFeedItem<'a>>,
}

#[derive(Serialize)]
struct JsonFeedItem<'a> {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    content_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_published: Option<String>,
}

const RSS_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
<channel>
<title>{{ title|xml }}</title>
<link>{{ link|xml }}</link>
<description>{{ description|xml }}</description>
{% if language %}
<language>{{ language|xml }}</language>
{% endif %}
{% for item in items %}
<item>
  <title>{{ item.title|xml }}</title>
{% if item.link %}
  <link>{{ item.link|xml }}</link>
{% endif %}
{% if item.pub_date %}
  <pubDate>{{ item.pub_date|xml }}</pubDate>
{% endif %}
{% if item.description %}
  <description>{{ item.description|xml }}</description>
{% endif %}
{% if item.image %}
  <enclosure url="{{ item.image|xml }}" type="image/jpeg" length="0"/>
{% endif %}
{% if item.guid %}
  <guid isPermaLink="false">{{ item.guid|xml }}</guid>
{% endif %}
</item>
{% endfor %}
</channel>
</rss>
"#;
