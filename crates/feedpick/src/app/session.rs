//! Interactive selection session: one item selector plus relative field selectors.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::app::inference::{ContainerMatch, InferenceOptions, infer_container};
use crate::app::preview::{Preview, PreviewScheduler, PreviewTicket, compute_preview};
use crate::app::relative::relative_selector;
use crate::domain::errors::{SelectError, SelectResult};
use crate::domain::model::{
    AbsoluteSelector, ExportPayload, Field, Mode, ScopedSelector, Selections, StaleFieldPolicy,
};
use crate::domain::tree::Tree;
use crate::infra::config::Config;
use crate::infra::sink::ExportSink;

/// Knobs fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub inference: InferenceOptions,
    /// Fields the operator may select, in toolbar order.
    pub fields: Vec<Field>,
    pub stale_fields: StaleFieldPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            inference: InferenceOptions::default(),
            fields: Field::ALL.to_vec(),
            stale_fields: StaleFieldPolicy::default(),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            inference: InferenceOptions::from_config(config),
            fields: config.session.fields.clone(),
            stale_fields: config.session.stale_fields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    ItemSet,
}

/// What a successful click changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    ItemSelected(ContainerMatch),
    FieldSet { field: Field, selector: ScopedSelector },
    FieldCleared { field: Field },
}

/// Everything a presentation layer needs to render the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub state: SessionState,
    pub item: Option<AbsoluteSelector>,
    pub fields: BTreeMap<Field, ScopedSelector>,
    pub preview: Option<Preview>,
    /// Mutation counter. Keeps counting across `clear`, so observers see the reset.
    pub revision: u64,
}

/// Selection state mutated one click at a time.
#[derive(Debug, Clone)]
pub struct SelectionSession {
    settings: SessionSettings,
    item: Option<AbsoluteSelector>,
    fields: BTreeMap<Field, ScopedSelector>,
    previews: PreviewScheduler,
    revision: u64,
}

impl Default for SelectionSession {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

impl SelectionSession {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            item: None,
            fields: BTreeMap::new(),
            previews: PreviewScheduler::new(),
            revision: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(SessionSettings::from_config(config))
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        if self.item.is_some() {
            SessionState::ItemSet
        } else {
            SessionState::Empty
        }
    }

    pub fn item_selector(&self) -> Option<&AbsoluteSelector> {
        self.item.as_ref()
    }

    pub fn field_selector(&self, field: Field) -> Option<&ScopedSelector> {
        self.fields.get(&field)
    }

    /// Bumped on every mutation so observers can detect changes cheaply.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Apply one click under the given mode.
    pub fn click<T: Tree>(
        &mut self,
        tree: &T,
        mode: Mode,
        node: T::Node,
    ) -> SelectResult<SelectOutcome> {
        match mode {
            Mode::Item => self.select_item(tree, node),
            Mode::Field(field) => self.select_field(tree, field, node),
        }
    }

    /// Generalize `node` to its repeating container and make that the item selector.
    pub fn select_item<T: Tree>(&mut self, tree: &T, node: T::Node) -> SelectResult<SelectOutcome> {
        let found = infer_container(tree, node, &self.settings.inference)?;
        tracing::debug!(selector = %found.selector, matches = found.match_count, "item selected");
        self.replace_item(found.selector.clone());
        Ok(SelectOutcome::ItemSelected(found))
    }

    /// Derive a field selector for `node` relative to the item containing it. Selecting the same
    /// target again unsets the field.
    pub fn select_field<T: Tree>(
        &mut self,
        tree: &T,
        field: Field,
        node: T::Node,
    ) -> SelectResult<SelectOutcome> {
        let Some(item) = &self.item else {
            return Err(SelectError::ItemNotSelected);
        };
        if !self.settings.fields.contains(&field) {
            return Err(SelectError::FieldNotEnabled(field));
        }

        let container = tree
            .query(item)?
            .into_iter()
            .find(|&container| tree.contains(container, node))
            .ok_or(SelectError::ClickOutsideItem)?;
        let selector = relative_selector(tree, container, node, &self.settings.inference)?;

        let outcome = if self.fields.get(&field) == Some(&selector) {
            self.fields.remove(&field);
            tracing::debug!(%field, "field toggled off");
            SelectOutcome::FieldCleared { field }
        } else {
            tracing::debug!(%field, selector = %selector, "field selected");
            self.fields.insert(field, selector.clone());
            SelectOutcome::FieldSet { field, selector }
        };
        self.touch();
        Ok(outcome)
    }

    /// Reset to a fresh empty session.
    pub fn clear(&mut self) {
        self.item = None;
        self.fields.clear();
        self.previews.reset();
        self.touch();
    }

    /// Load previously exported selections. All-or-nothing.
    pub fn restore(&mut self, selections: Selections) -> SelectResult<()> {
        if selections.item.is_none() && !selections.fields.is_empty() {
            return Err(SelectError::ItemNotSelected);
        }
        if let Some(field) = selections
            .fields
            .keys()
            .find(|field| !self.settings.fields.contains(field))
        {
            return Err(SelectError::FieldNotEnabled(*field));
        }
        self.item = selections.item;
        self.fields = selections.fields;
        self.previews.reset();
        self.touch();
        Ok(())
    }

    /// Immutable copy of the current selections.
    pub fn snapshot(&self) -> Selections {
        Selections {
            item: self.item.clone(),
            fields: self.fields.clone(),
        }
    }

    /// Hand the current selections to `sink`. Leaves the session untouched.
    pub fn export(
        &self,
        location: impl Into<String>,
        sink: &mut dyn ExportSink,
    ) -> Result<ExportPayload> {
        let payload = ExportPayload::new(self.snapshot(), location);
        sink.deliver(&payload)?;
        Ok(payload)
    }

    /// Recompute diagnostics against the current tree and keep them as the latest preview.
    pub fn refresh_preview<T: Tree>(&mut self, tree: &T) -> Preview {
        let ticket = self.previews.issue();
        let preview = compute_preview(tree, &self.snapshot());
        self.previews.complete(ticket, preview.clone());
        preview
    }

    /// The tree changed underneath the session. Selectors stay as they are; only the diagnostics
    /// are recomputed.
    pub fn notify_tree_changed<T: Tree>(&mut self, tree: &T) -> Preview {
        tracing::debug!(revision = self.revision, "tree changed, refreshing preview");
        self.refresh_preview(tree)
    }

    /// Start a preview computed elsewhere; finishing an older ticket after a newer one is a no-op.
    pub fn begin_preview(&mut self) -> PreviewTicket {
        self.previews.issue()
    }

    pub fn finish_preview(&mut self, ticket: PreviewTicket, preview: Preview) -> bool {
        self.previews.complete(ticket, preview)
    }

    pub fn last_preview(&self) -> Option<&Preview> {
        self.previews.latest()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.state(),
            item: self.item.clone(),
            fields: self.fields.clone(),
            preview: self.previews.latest().cloned(),
            revision: self.revision,
        }
    }

    fn replace_item(&mut self, selector: AbsoluteSelector) {
        let changed = self.item.as_ref() != Some(&selector);
        if changed
            && !self.fields.is_empty()
            && self.settings.stale_fields == StaleFieldPolicy::Clear
        {
            tracing::debug!(dropped = self.fields.len(), "item changed, dropping field selectors");
            self.fields.clear();
        }
        self.item = Some(selector);
        self.touch();
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}
