#![forbid(unsafe_code)]

//! Scripted scenarios, one per screen.
//!
//! Each scenario plays a user session against the in-memory collaborators
//! and records what the screen shows after every step.

use std::rc::Rc;

use painel::{
    CollectionConfig, CollectionView, DataSource, DerivationGraph, FetchError, FieldValue,
    ListParams, Navigator, Result, SubmitAttempt, SubmitMode,
};
use serde_json::{Value, json};
use tracing::{info, info_span};

use crate::memory::{InMemorySource, RecordingNavigator};
use crate::screens::Screen;
use crate::screens::additive_form::{self, AdditiveFormScreen};
use crate::screens::cuisine_list::CuisineListScreen;
use crate::screens::registration::RegistrationScreen;

/// Identifies a demo screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenId {
    CuisineList,
    AdditiveForm,
    Registration,
}

impl ScreenId {
    pub const ALL: [ScreenId; 3] = [Self::CuisineList, Self::AdditiveForm, Self::Registration];

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::CuisineList => "Cuisines",
            Self::AdditiveForm => "Additive item",
            Self::Registration => "Registration",
        }
    }

    /// 1-indexed lookup, as used on the command line.
    #[must_use]
    pub fn from_number(n: u16) -> Option<Self> {
        (n as usize)
            .checked_sub(1)
            .and_then(|idx| Self::ALL.get(idx).copied())
    }
}

/// Knobs shared by all scenarios.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Page size of list screens.
    pub page_size: usize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

/// Text recorded while a scenario runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    fn step(&mut self, label: &str, screen: &dyn Screen) {
        self.lines.push(format!("== {label}"));
        self.lines.extend(screen.view());
    }

    fn note(&mut self, text: impl Into<String>) {
        self.lines.push(format!("-- {}", text.into()));
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether any line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

/// Run the scenario of `id`.
pub fn run(id: ScreenId, config: &ScenarioConfig) -> Result<Transcript> {
    let _span = info_span!("painel.demo", screen = id.title()).entered();
    let transcript = match id {
        ScreenId::CuisineList => cuisine_list(config)?,
        ScreenId::AdditiveForm => additive_form(config)?,
        ScreenId::Registration => registration()?,
    };
    info!(lines = transcript.lines.len(), "scenario finished");
    Ok(transcript)
}

const CUISINES: [&str; 23] = [
    "Alemã",
    "Árabe",
    "Argentina",
    "Baiana",
    "Brasileira",
    "Chinesa",
    "Coreana",
    "Espanhola",
    "Francesa",
    "Grega",
    "Indiana",
    "Italiana",
    "Japonesa",
    "Libanesa",
    "Mexicana",
    "Mineira",
    "Nordestina",
    "Peruana",
    "Portuguesa",
    "Tailandesa",
    "Turca",
    "Vegana",
    "Vietnamita",
];

/// Seed data of the cuisine scenario; every fourth cuisine is inactive.
#[must_use]
pub fn seed_cuisines() -> Vec<Value> {
    CUISINES
        .iter()
        .enumerate()
        .map(|(i, nome)| json!({"nome": nome, "ativo": i % 4 != 3}))
        .collect()
}

fn cuisine_list(config: &ScenarioConfig) -> Result<Transcript> {
    let graph = DerivationGraph::new();
    let source = Rc::new(InMemorySource::new("nome").with_records(seed_cuisines()));
    let mut screen = CuisineListScreen::new(
        &graph,
        Rc::clone(&source) as Rc<dyn DataSource>,
        CollectionConfig::default().page_size(config.page_size),
    );
    let mut t = Transcript::default();
    t.step("opened", &screen);

    let first = screen.reload();
    let second = screen.reload();
    t.note(format!("reloads {first} and {second} in flight"));
    if let Some(request) = source.take_last() {
        let reply = source.answer(&request);
        screen.deliver(reply.token, reply.result);
    }
    if let Some(reply) = source.answer_next() {
        let applied = screen.deliver(reply.token, reply.result);
        t.note(format!("late response {} applied: {applied}", reply.token));
    }
    t.step("loaded", &screen);

    screen.go_to_page(screen.collection().total_pages());
    t.step("last page", &screen);

    screen.search("ana");
    t.step("search \"ana\"", &screen);

    screen.show_query("true");
    t.step("only active", &screen);

    screen.search("");
    screen.show_query("");
    screen.set_page_size(5);
    t.step("cleared, 5 per page", &screen);

    source.fail_next(FetchError::transport("connection reset"));
    screen.reload();
    if let Some(reply) = source.answer_next() {
        screen.deliver(reply.token, reply.result);
    }
    t.step("reload failed", &screen);
    Ok(t)
}

fn additive_form(config: &ScenarioConfig) -> Result<Transcript> {
    let graph = DerivationGraph::new();
    let source = Rc::new(InMemorySource::new("nome").unique("nome"));
    let navigator = Rc::new(RecordingNavigator::default());

    let list: CollectionView<Value> = CollectionView::new(
        &graph,
        Vec::new(),
        |item: &Value| item["nome"].as_str().unwrap_or_default(),
        CollectionConfig::default().page_size(config.page_size),
    );
    let list_source = Rc::clone(&source);
    list.set_fetcher(move |token| list_source.list(&ListParams::new(), token));

    let mut screen = AdditiveFormScreen::new(
        &graph,
        Rc::clone(&source) as Rc<dyn DataSource>,
        Rc::clone(&navigator) as Rc<dyn Navigator>,
        SubmitMode::Create,
    )?;
    screen.refresh_on_success(list.clone());
    let mut t = Transcript::default();
    t.step("new item", &screen);

    screen.input("nome", "Molhos extras")?;
    screen.input("categoria", FieldValue::id(3))?;
    screen.set_kind(additive_form::KIND_QUANTITY)?;
    screen.input("quantidade_minima", "5")?;
    screen.input("limite", "3")?;
    t.step("QUANTITY with limit 3 < minimum 5", &screen);

    screen.input("limite", "5")?;
    let attempt = screen.submit();
    t.note(format!("submit: {attempt:?}"));
    t.step("limit fixed, no options yet", &screen);

    screen.add_option("Barbecue", 1.5)?;
    screen.add_option("Mostarda e mel", 1.5)?;
    let attempt = screen.submit();
    let again = screen.submit();
    t.note(format!("submit: {attempt:?}, second press: {again:?}"));
    t.step("saving", &screen);

    if let Some(reply) = source.answer_next() {
        screen.resolve_submit(reply.token, reply.result);
    }
    if let Some(reply) = source.answer_next() {
        list.apply_reload(reply.token, reply.result.and_then(as_array));
    }
    t.step("saved", &screen);
    t.note(format!("list now shows {} item(s)", list.total_items()));

    let id = screen
        .saved()
        .first()
        .and_then(|item| item["id"].as_u64())
        .map_or_else(|| "1".to_string(), |id| id.to_string());
    let mut edit = AdditiveFormScreen::new(
        &graph,
        Rc::clone(&source) as Rc<dyn DataSource>,
        Rc::clone(&navigator) as Rc<dyn Navigator>,
        SubmitMode::Create,
    )?;
    let token = edit.load(&id);
    if let Some(reply) = source.answer_next() {
        edit.resolve_load(reply.token, reply.result)?;
    }
    t.note(format!("edit screen loaded {token}"));
    t.step("editing", &edit);

    edit.set_kind(additive_form::KIND_SINGLE)?;
    t.step("switched to SINGLE", &edit);
    if let SubmitAttempt::Dispatched(_) = edit.submit()
        && let Some(reply) = source.answer_next()
    {
        edit.resolve_submit(reply.token, reply.result);
    }
    t.step("updated", &edit);

    let mut missing = AdditiveFormScreen::new(
        &graph,
        Rc::clone(&source) as Rc<dyn DataSource>,
        Rc::clone(&navigator) as Rc<dyn Navigator>,
        SubmitMode::Create,
    )?;
    missing.load("999");
    if let Some(reply) = source.answer_next() {
        missing.resolve_load(reply.token, reply.result)?;
    }
    t.step("open missing item", &missing);
    t.note(format!(
        "navigated to {}",
        navigator.current().unwrap_or_default()
    ));
    Ok(t)
}

fn as_array(value: Value) -> std::result::Result<Vec<Value>, FetchError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(FetchError::transport(format!("expected a list, got {other}"))),
    }
}

fn registration() -> Result<Transcript> {
    let graph = DerivationGraph::new();
    let source = Rc::new(
        InMemorySource::new("email")
            .unique("email")
            .with_records([json!({"nome": "Bia", "email": "bia@example.com"})]),
    );
    let mut screen = RegistrationScreen::new(&graph, Rc::clone(&source) as Rc<dyn DataSource>)?;
    let mut t = Transcript::default();
    t.step("empty", &screen);

    screen.input("nome", "Bia Lima")?;
    screen.input("email", "bia@example.com")?;
    screen.input("senha", "Abc12345")?;
    screen.input("confirmarSenha", "Abc1234")?;
    t.step("confirmation mismatch", &screen);

    screen.input("confirmarSenha", "Abc12345")?;
    if let SubmitAttempt::Dispatched(_) = screen.submit()
        && let Some(reply) = source.answer_next()
    {
        screen.resolve(reply.token, reply.result);
    }
    t.step("email already registered", &screen);

    screen.input("email", "bia.lima@example.com")?;
    if let SubmitAttempt::Dispatched(_) = screen.submit()
        && let Some(reply) = source.answer_next()
    {
        screen.resolve(reply.token, reply.result);
    }
    t.step("registered", &screen);
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_numbers_are_one_indexed() {
        assert_eq!(ScreenId::from_number(1), Some(ScreenId::CuisineList));
        assert_eq!(ScreenId::from_number(3), Some(ScreenId::Registration));
        assert_eq!(ScreenId::from_number(0), None);
        assert_eq!(ScreenId::from_number(4), None);
    }

    #[test]
    fn seed_has_inactive_cuisines() {
        let seed = seed_cuisines();
        assert_eq!(seed.len(), 23);
        assert_eq!(seed.iter().filter(|c| c["ativo"] == json!(false)).count(), 5);
    }
}
