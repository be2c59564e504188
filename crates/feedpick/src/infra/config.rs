//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::domain::model::{Field, StaleFieldPolicy};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".feedpick/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub inference: Inference,
    #[serde(default)]
    pub classes: Classes,
    #[serde(default)]
    pub session: Session,
    #[serde(default = "Feed::unset")]
    pub feed: Feed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inference {
    #[serde(default = "Inference::default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "Inference::default_class_depth")]
    pub class_depth: usize,
    #[serde(default = "Inference::default_structural_depth")]
    pub structural_depth: usize,
    #[serde(default = "Inference::default_relative_depth")]
    pub relative_depth: usize,
    #[serde(default = "Inference::default_min_matches")]
    pub min_matches: usize,
    #[serde(default = "Inference::default_max_matches")]
    pub max_matches: usize,
    #[serde(default = "Inference::default_unindexed_bonus")]
    pub unindexed_bonus: i64,
    #[serde(default = "Inference::default_match_bonus_cap")]
    pub match_bonus_cap: usize,
}

impl Inference {
    fn default_max_depth() -> usize {
        8
    }

    fn default_class_depth() -> usize {
        6
    }

    fn default_structural_depth() -> usize {
        4
    }

    fn default_relative_depth() -> usize {
        8
    }

    fn default_min_matches() -> usize {
        2
    }

    fn default_max_matches() -> usize {
        400
    }

    fn default_unindexed_bonus() -> i64 {
        1500
    }

    fn default_match_bonus_cap() -> usize {
        100
    }
}

impl Default for Inference {
    fn default() -> Self {
        Self {
            max_depth: Self::default_max_depth(),
            class_depth: Self::default_class_depth(),
            structural_depth: Self::default_structural_depth(),
            relative_depth: Self::default_relative_depth(),
            min_matches: Self::default_min_matches(),
            max_matches: Self::default_max_matches(),
            unindexed_bonus: Self::default_unindexed_bonus(),
            match_bonus_cap: Self::default_match_bonus_cap(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classes {
    #[serde(default = "Classes::default_ignore_prefixes")]
    pub ignore_prefixes: Vec<String>,
}

impl Classes {
    fn default_ignore_prefixes() -> Vec<String> {
        crate::app::builder::DEFAULT_IGNORED_CLASS_PREFIXES
            .iter()
            .map(|prefix| prefix.to_string())
            .collect()
    }
}

impl Default for Classes {
    fn default() -> Self {
        Self {
            ignore_prefixes: Self::default_ignore_prefixes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default = "Session::default_fields")]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub stale_fields: StaleFieldPolicy,
}

impl Session {
    fn default_fields() -> Vec<Field> {
        Field::ALL.to_vec()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            fields: Self::default_fields(),
            stale_fields: StaleFieldPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

impl Feed {
    fn default_title() -> &'static str {
        "Untitled feed"
    }

    fn default_language() -> &'static str {
        "en"
    }

    fn default_format() -> &'static str {
        "rss"
    }

    /// Layer value for files without a `[feed]` table.
    fn unset() -> Self {
        Self {
            title: None,
            description: None,
            language: None,
            format: None,
        }
    }

    pub fn title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| Self::default_title().to_owned())
    }

    pub fn description(&self) -> String {
        self.description.clone().unwrap_or_default()
    }

    pub fn language(&self) -> String {
        self.language
            .clone()
            .unwrap_or_else(|| Self::default_language().to_owned())
    }

    pub fn format(&self) -> &str {
        self.format.as_deref().unwrap_or(Self::default_format())
    }
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            title: Some(Self::default_title().to_owned()),
            description: Some(String::new()),
            language: Some(Self::default_language().to_owned()),
            format: Some(Self::default_format().to_owned()),
        }
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    max_matches: Option<String>,
    fields: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            max_matches: env::var("FEEDPICK_MAX_MATCHES").ok(),
            fields: env::var("FEEDPICK_FIELDS").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(max_matches: &str, fields: &str) -> Self {
        Self {
            max_matches: Some(max_matches.to_owned()),
            fields: Some(fields.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            inference: merge_inference(self.inference, other.inference),
            classes: merge_classes(self.classes, other.classes),
            session: merge_session(self.session, other.session),
            feed: merge_feed(self.feed, other.feed),
        }
    }
}

fn merge_inference(base: Inference, overlay: Inference) -> Inference {
    Inference {
        max_depth: choose(base.max_depth, overlay.max_depth, Inference::default_max_depth),
        class_depth: choose(
            base.class_depth,
            overlay.class_depth,
            Inference::default_class_depth,
        ),
        structural_depth: choose(
            base.structural_depth,
            overlay.structural_depth,
            Inference::default_structural_depth,
        ),
        relative_depth: choose(
            base.relative_depth,
            overlay.relative_depth,
            Inference::default_relative_depth,
        ),
        min_matches: choose(
            base.min_matches,
            overlay.min_matches,
            Inference::default_min_matches,
        ),
        max_matches: choose(
            base.max_matches,
            overlay.max_matches,
            Inference::default_max_matches,
        ),
        unindexed_bonus: choose(
            base.unindexed_bonus,
            overlay.unindexed_bonus,
            Inference::default_unindexed_bonus,
        ),
        match_bonus_cap: choose(
            base.match_bonus_cap,
            overlay.match_bonus_cap,
            Inference::default_match_bonus_cap,
        ),
    }
}

fn merge_classes(base: Classes, overlay: Classes) -> Classes {
    Classes {
        ignore_prefixes: choose(
            base.ignore_prefixes,
            overlay.ignore_prefixes,
            Classes::default_ignore_prefixes,
        ),
    }
}

fn merge_session(base: Session, overlay: Session) -> Session {
    Session {
        fields: choose(base.fields, overlay.fields, Session::default_fields),
        stale_fields: choose(
            base.stale_fields,
            overlay.stale_fields,
            StaleFieldPolicy::default,
        ),
    }
}

fn merge_feed(mut base: Feed, overlay: Feed) -> Feed {
    if let Some(value) = overlay.title {
        base.title = Some(value);
    }
    if let Some(value) = overlay.description {
        base.description = Some(value);
    }
    if let Some(value) = overlay.language {
        base.language = Some(value);
    }
    if let Some(value) = overlay.format {
        base.format = Some(value);
    }
    base
}

/// Overlay values win unless they merely restate the built-in default.
fn choose<T: PartialEq>(base: T, overlay: T, default_fn: fn() -> T) -> T {
    if overlay != default_fn() {
        overlay
    } else {
        base
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("feedpick/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(raw) = env.max_matches {
        match raw.trim().parse::<usize>() {
            Ok(value) => config.inference.max_matches = value,
            Err(err) => tracing::warn!(value = %raw, error = %err, "ignoring FEEDPICK_MAX_MATCHES"),
        }
    }
    if let Some(raw) = env.fields {
        let parsed: Result<Vec<Field>, _> = raw
            .split(',')
            .filter(|name| !name.trim().is_empty())
            .map(str::parse)
            .collect();
        match parsed {
            Ok(fields) if !fields.is_empty() => config.session.fields = fields,
            Ok(_) => tracing::warn!("ignoring empty FEEDPICK_FIELDS"),
            Err(err) => tracing::warn!(value = %raw, error = %err, "ignoring FEEDPICK_FIELDS"),
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.inference.max_matches, 400);
        assert_eq!(config.session.fields, Field::ALL.to_vec());
        assert!(config.classes.ignore_prefixes.contains(&"js-".into()));
        assert_eq!(config.feed.format(), "rss");
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[inference]
max_matches = 250
[classes]
ignore_prefixes = ["css-"]
[feed]
title = "Gemeente nieuws"
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".feedpick"))?;
        fs::create_dir_all(workspace_dir.join(".git"))?;
        fs::write(
            workspace_dir.join(".feedpick/config.toml"),
            r#"
[session]
fields = ["title", "date", "summary"]
stale_fields = "keep"
[feed]
format = "json"
"#,
        )?;

        let global_path = Some(global);
        let workspace_path = Some(workspace_dir.join(".feedpick/config.toml"));

        let config =
            Config::load_with_layers(global_path, workspace_path, EnvOverrides::default())?;

        assert_eq!(config.inference.max_matches, 250);
        assert_eq!(config.inference.class_depth, 6);
        assert_eq!(config.classes.ignore_prefixes, vec!["css-".to_string()]);
        assert_eq!(
            config.session.fields,
            vec![Field::Title, Field::Date, Field::Summary]
        );
        assert_eq!(config.session.stale_fields, StaleFieldPolicy::Keep);
        assert_eq!(config.feed.title(), "Gemeente nieuws");
        assert_eq!(config.feed.format(), "json");

        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("120", "title, link");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.inference.max_matches, 120);
        assert_eq!(config.session.fields, vec![Field::Title, Field::Link]);
        Ok(())
    }

    #[test]
    fn malformed_env_overrides_are_ignored() -> Result<()> {
        let overrides = EnvOverrides::for_tests("lots", "title,author");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.inference.max_matches, 400);
        assert_eq!(config.session.fields, Field::ALL.to_vec());
        Ok(())
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }
}
