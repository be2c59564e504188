use std::collections::BTreeSet;

use feedpick::app::extract::extract_items;
use feedpick::app::session::{SelectOutcome, SelectionSession, SessionState};
use feedpick::app::store::{SessionSnapshot, SessionStore};
use feedpick::domain::errors::SelectError;
use feedpick::domain::model::{Field, Mode};
use feedpick::domain::tree::Tree;
use feedpick::infra::config::Config;
use feedpick::infra::html::HtmlTree;
use feedpick::infra::sink::MemorySink;

const PAGE: &str = r#"<html><body>
    <header><h1>Stadsnieuws</h1></header>
    <main>
      <div class="card"><h3 class="headline">Markt verhuist</h3><span class="date">01-05-2024</span></div>
      <div class="card"><h3 class="headline">Nieuwe brug open</h3><span class="date">02-05-2024</span></div>
      <div class="card"><h3 class="headline">Parkeertarief omlaag</h3><span class="date">03-05-2024</span></div>
      <div class="card"><h3 class="headline">Bibliotheek langer open</h3><span class="date">04-05-2024</span></div>
      <div class="card"><h3 class="headline">Zomerfeest gepland</h3><span class="date">05-05-2024</span></div>
    </main>
    <footer><p class="colophon">Redactie</p></footer>
</body></html>"#;

fn node(tree: &HtmlTree, css: &str, index: usize) -> ego_tree::NodeId {
    tree.find(css).expect("valid css")[index]
}

#[test]
fn cards_scenario_end_to_end() {
    let tree = HtmlTree::parse_document(PAGE);
    let mut session = SelectionSession::from_config(&Config::default());

    let err = session
        .click(&tree, Mode::Field(Field::Title), node(&tree, "h3", 0))
        .unwrap_err();
    assert_eq!(err, SelectError::ItemNotSelected);
    assert_eq!(session.state(), SessionState::Empty);

    let clicked = node(&tree, "div.card", 1);
    let SelectOutcome::ItemSelected(found) = session.click(&tree, Mode::Item, clicked).unwrap()
    else {
        panic!("item click should select an item");
    };
    assert_eq!(found.match_count, 5);
    let containers = tree.query(&found.selector).unwrap();
    assert!(containers.contains(&clicked));

    let headline = node(&tree, "h3.headline", 1);
    let outcome = session
        .click(&tree, Mode::Field(Field::Title), headline)
        .unwrap();
    let SelectOutcome::FieldSet { selector, .. } = outcome else {
        panic!("first title click should set the field");
    };
    let per_card: Vec<usize> = containers
        .iter()
        .map(|&card| tree.query_scoped(card, &selector).unwrap().len())
        .collect();
    assert_eq!(per_card, vec![1; 5]);
    let titles: BTreeSet<String> = containers
        .iter()
        .map(|&card| tree.text(tree.query_scoped(card, &selector).unwrap()[0]))
        .collect();
    assert!(titles.contains("Zomerfeest gepland"));

    let preview = session.refresh_preview(&tree);
    assert_eq!(preview.item_count, 5);
    assert_eq!(preview.field_count(Field::Title), 5);

    assert_eq!(
        session
            .click(&tree, Mode::Field(Field::Title), headline)
            .unwrap(),
        SelectOutcome::FieldCleared { field: Field::Title }
    );
    assert_eq!(session.field_selector(Field::Title), None);

    let err = session
        .click(&tree, Mode::Field(Field::Date), node(&tree, "p.colophon", 0))
        .unwrap_err();
    assert_eq!(err, SelectError::ClickOutsideItem);
    assert_eq!(session.state(), SessionState::ItemSet);
}

#[test]
fn exported_selections_survive_the_store_and_extract_items() -> anyhow::Result<()> {
    let tree = HtmlTree::parse_document(PAGE);
    let mut session = SelectionSession::default();
    session.click(&tree, Mode::Item, node(&tree, "div.card", 0))?;
    session.click(&tree, Mode::Field(Field::Title), node(&tree, "h3", 2))?;
    session.click(&tree, Mode::Field(Field::Date), node(&tree, "span.date", 2))?;

    let mut sink = MemorySink::new();
    let payload = session.export("https://stad.example/nieuws", &mut sink)?;
    assert_eq!(payload.kind, "FEED_DONE");
    assert_eq!(sink.delivered().len(), 1);

    let temp = tempfile::tempdir()?;
    let store = SessionStore::new(temp.path());
    store.save(&SessionSnapshot {
        selections: payload.selections.clone(),
        location: Some(payload.location.clone()),
    })?;
    let restored = store.load()?.expect("snapshot saved");

    let mut resumed = SelectionSession::default();
    resumed.restore(restored.selections)?;
    assert_eq!(resumed.snapshot(), session.snapshot());

    let items = extract_items(&tree, &resumed.snapshot(), None)?;
    assert_eq!(items.len(), 5);
    assert_eq!(items[0].title.as_deref(), Some("Markt verhuist"));
    assert_eq!(items[0].summary.as_deref(), Some("Markt verhuist"));
    assert_eq!(items[4].date.as_deref(), Some("05-05-2024"));
    assert!(items.iter().all(|item| item.published.is_some()));
    Ok(())
}
