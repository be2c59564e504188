//! Command line front end operating on saved HTML snapshots.
//!
//! A click is designated by a CSS selector naming the clicked element; the first match in
//! document order is used.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ego_tree::NodeId;
use serde::Serialize;
use url::Url;

use crate::app::extract::extract_items;
use crate::app::feed::{FeedFormat, FeedMeta, FeedRenderer};
use crate::app::session::{SelectOutcome, SelectionSession};
use crate::app::store::{SessionSnapshot, SessionStore, load_selections};
use crate::domain::model::{AbsoluteSelector, Field, Mode, Selections};
use crate::infra::config::Config;
use crate::infra::html::HtmlTree;
use crate::infra::sink::{JsonFileSink, MemorySink};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Infer CSS selectors for repeating page items and turn them into feeds",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer the repeating item selector from a clicked element
    Item {
        html: PathBuf,
        /// CSS selector naming the clicked element
        #[arg(long)]
        click: String,
    },
    /// Derive a field selector relative to the item containing the clicked element
    Field {
        html: PathBuf,
        /// Item selector the field belongs to
        #[arg(long)]
        item: String,
        #[arg(long, value_enum)]
        field: Field,
        #[arg(long)]
        click: String,
    },
    /// Report match counts for a selections file
    Preview {
        html: PathBuf,
        #[arg(long)]
        selections: PathBuf,
    },
    /// Apply a selections file and print the extracted items as JSON
    Extract {
        html: PathBuf,
        #[arg(long)]
        selections: PathBuf,
        /// Base for resolving relative links and image sources
        #[arg(long)]
        base_url: Option<Url>,
    },
    /// Render extracted items as an RSS or JSON feed
    Feed {
        html: PathBuf,
        #[arg(long)]
        selections: PathBuf,
        #[arg(long, value_enum)]
        format: Option<FeedFormat>,
        #[arg(long)]
        title: Option<String>,
        /// Home page of the feed; defaults to the base URL
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        base_url: Option<Url>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run a whole selection session from clicks and export the result
    Pick {
        html: PathBuf,
        /// Clicked element used to infer the item selector
        #[arg(long)]
        item: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        image: Option<String>,
        /// Location recorded in the export payload; defaults to the snapshot's file URL
        #[arg(long)]
        location: Option<String>,
        /// Write the payload here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also persist the session under .feedpick/session.json
        #[arg(long)]
        save: bool,
    },
}

#[derive(Serialize)]
struct FieldReport<'a> {
    field: Field,
    selector: Option<&'a str>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Item { html, click } => {
            let tree = load_tree(&html)?;
            let mut session = SelectionSession::from_config(&config);
            let node = locate(&tree, &click)?;
            match session.click(&tree, Mode::Item, node)? {
                SelectOutcome::ItemSelected(found) => print_json(&found),
                other => anyhow::bail!("unexpected outcome for item click: {other:?}"),
            }
        }
        Commands::Field {
            html,
            item,
            field,
            click,
        } => {
            let tree = load_tree(&html)?;
            let mut session = SelectionSession::from_config(&config);
            session.restore(Selections {
                item: Some(AbsoluteSelector::parse(&item)?),
                ..Selections::default()
            })?;
            let node = locate(&tree, &click)?;
            session.click(&tree, Mode::Field(field), node)?;
            print_json(&FieldReport {
                field,
                selector: session.field_selector(field).map(|sel| sel.as_str()),
            })
        }
        Commands::Preview { html, selections } => {
            let tree = load_tree(&html)?;
            let mut session = SelectionSession::from_config(&config);
            session.restore(load_selections(&selections)?)?;
            print_json(&session.refresh_preview(&tree))
        }
        Commands::Extract {
            html,
            selections,
            base_url,
        } => {
            let tree = load_tree(&html)?;
            let selections = load_selections(&selections)?;
            print_json(&extract_items(&tree, &selections, base_url.as_ref())?)
        }
        Commands::Feed {
            html,
            selections,
            format,
            title,
            link,
            base_url,
            output,
        } => {
            let tree = load_tree(&html)?;
            let selections = load_selections(&selections)?;
            let items = extract_items(&tree, &selections, base_url.as_ref())?;

            let home = link
                .or_else(|| base_url.as_ref().map(Url::to_string))
                .unwrap_or_else(|| file_location(&html));
            let mut meta = FeedMeta::from_config(&config, home);
            if let Some(title) = title {
                meta.title = title;
            }
            let format = match format {
                Some(format) => format,
                None => config.feed.format().parse()?,
            };

            let rendered = FeedRenderer::new()?.render(&meta, &items, format)?;
            write_or_print(output.as_deref(), &rendered)?;
            tracing::info!(items = items.len(), format = format.as_str(), "feed rendered");
            Ok(())
        }
        Commands::Pick {
            html,
            item,
            title,
            date,
            summary,
            link,
            image,
            location,
            output,
            save,
        } => {
            let tree = load_tree(&html)?;
            let mut session = SelectionSession::from_config(&config);
            session.click(&tree, Mode::Item, locate(&tree, &item)?)?;

            let clicks = [
                (Field::Title, title),
                (Field::Date, date),
                (Field::Summary, summary),
                (Field::Link, link),
                (Field::Image, image),
            ];
            for (field, click) in clicks {
                let Some(click) = click else { continue };
                session
                    .click(&tree, Mode::Field(field), locate(&tree, &click)?)
                    .with_context(|| format!("failed to select {field} from '{click}'"))?;
            }

            let preview = session.refresh_preview(&tree);
            tracing::info!(items = preview.item_count, "selection complete");

            let location = location.unwrap_or_else(|| file_location(&html));
            let payload = match output {
                Some(path) => session.export(location, &mut JsonFileSink::new(path))?,
                None => {
                    let mut sink = MemorySink::new();
                    let payload = session.export(location, &mut sink)?;
                    print_json(&payload)?;
                    payload
                }
            };

            if save {
                let store = SessionStore::new(env::current_dir()?);
                store.save(&SessionSnapshot {
                    selections: payload.selections,
                    location: Some(payload.location),
                })?;
                tracing::info!(path = %store.path().display(), "session saved");
            }
            Ok(())
        }
    }
}

fn load_tree(path: &Path) -> Result<HtmlTree> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read HTML snapshot {}", path.display()))?;
    Ok(HtmlTree::parse_document(&source))
}

fn locate(tree: &HtmlTree, css: &str) -> Result<NodeId> {
    tree.find_first(css)?
        .with_context(|| format!("no element matches '{css}'"))
}

fn file_location(path: &Path) -> String {
    path.canonicalize()
        .ok()
        .and_then(|absolute| Url::from_file_path(absolute).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let data = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{data}");
    Ok(())
}

fn write_or_print(output: Option<&Path>, contents: &str) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            print!("{contents}");
            Ok(())
        }
    }
}
