#![forbid(unsafe_code)]

//! Additive item form (create and edit).
//!
//! The item kind drives which quantity fields apply:
//!
//! | kind     | quantidade_minima     | limite                |
//! |----------|-----------------------|-----------------------|
//! | SINGLE   | cleared               | cleared               |
//! | MULTI    | cleared               | Min(1)                |
//! | QUANTITY | Required, Min(0)      | Required, Min(1)      |
//!
//! Under QUANTITY the limit must also be at least the minimum.

use std::cell::RefCell;
use std::rc::Rc;

use painel::forms::validation::ValidationError;
use painel::{
    Activation, Coercion, ConditionalPolicy, CrossFieldRule, DataSource, DerivationGraph,
    EntityLoader, FetchError, FetchToken, FieldValue, Form, JsonProjection, LoaderConfig,
    Navigator, Refresh, Result, RuleSet, SubmissionController, SubmitAttempt, SubmitConfig,
    SubmitMode, Validator,
};
use serde_json::{Value, json};

use super::{Screen, error_lines};

/// Route of the additive list; a missing item navigates back here.
pub const ROUTE: &str = "/adicionais";

pub const KIND_SINGLE: &str = "SINGLE";
pub const KIND_MULTI: &str = "MULTI";
pub const KIND_QUANTITY: &str = "QUANTITY";

const FIELDS: [&str; 7] = [
    "nome",
    "tipo",
    "quantidade_minima",
    "limite",
    "preco",
    "categoria",
    "ativo",
];

/// Rule set of the additive form.
#[must_use]
pub fn rules() -> RuleSet {
    let quantities = ConditionalPolicy::new("tipo", ["quantidade_minima", "limite"], |kind| {
        match kind.as_text().as_str() {
            KIND_QUANTITY => vec![
                Activation::new("quantidade_minima", [Validator::Required, Validator::Min(0.0)]),
                Activation::new("limite", [Validator::Required, Validator::Min(1.0)]),
            ],
            KIND_MULTI => vec![
                Activation::cleared("quantidade_minima"),
                Activation::new("limite", [Validator::Min(1.0)]),
            ],
            _ => vec![
                Activation::cleared("quantidade_minima"),
                Activation::cleared("limite"),
            ],
        }
    });

    RuleSet::new()
        .field(
            "nome",
            [
                Validator::Required,
                Validator::MaxLength(60),
                Validator::custom("not_numeric", "Name cannot be only digits", |value, _| {
                    value.is_empty() || value.as_number().is_none()
                }),
            ],
        )
        .field_with("tipo", KIND_SINGLE, [Validator::Required])
        .field("quantidade_minima", [])
        .field("limite", [])
        .field("preco", [Validator::Min(0.0)])
        .field("categoria", [Validator::Required])
        .field_with("ativo", true, [])
        .list("opcoes", true)
        .policy(quantities)
        .cross(CrossFieldRule::at_least("limite", "quantidade_minima").when("tipo", [KIND_QUANTITY]))
}

/// Entity/payload mapping of the additive form.
#[must_use]
pub fn projection() -> JsonProjection {
    JsonProjection::new()
        .field("nome", Coercion::Text)
        .field("tipo", Coercion::Text)
        .field("quantidade_minima", Coercion::Number)
        .field("limite", Coercion::Number)
        .field("preco", Coercion::Number)
        .field("ativo", Coercion::Bool)
        .select("categoria", "id_categoria")
        .list("opcoes", "opcoes")
}

/// The additive item form screen.
pub struct AdditiveFormScreen {
    form: Form,
    controller: SubmissionController<JsonProjection>,
    loader: EntityLoader<JsonProjection>,
    saved: Rc<RefCell<Vec<Value>>>,
}

impl AdditiveFormScreen {
    /// Create the screen in `mode`. Edit screens call [`Self::load`] next.
    pub fn new(
        graph: &DerivationGraph,
        source: Rc<dyn DataSource>,
        navigator: Rc<dyn Navigator>,
        mode: SubmitMode,
    ) -> Result<Self> {
        let form = Form::new(graph, rules())?;

        let mut controller =
            SubmissionController::new(form.clone(), projection(), Rc::clone(&source), mode)
                .with_config(SubmitConfig::default().success_message("Additive item saved."));
        let saved = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&saved);
        controller.on_success(move |entity| sink.borrow_mut().push(entity.clone()));

        let loader = EntityLoader::new(
            projection(),
            source,
            navigator,
            LoaderConfig::default()
                .fallback_path(ROUTE)
                .not_found_message("Additive item not found."),
        );

        Ok(Self {
            form,
            controller,
            loader,
            saved,
        })
    }

    /// Type a value into `field` (write and touch).
    pub fn input(&self, field: &str, value: impl Into<FieldValue>) -> Result<()> {
        self.form.set(field, value)?;
        self.form.touch(field)?;
        Ok(())
    }

    /// Pick the item kind.
    pub fn set_kind(&self, kind: &str) -> Result<()> {
        self.input("tipo", kind)
    }

    /// Append an option row.
    pub fn add_option(&self, nome: &str, preco: f64) -> Result<usize> {
        Ok(self
            .form
            .push_item("opcoes", json!({"nome": nome, "preco": preco}))?)
    }

    /// Remove the option row at `index`.
    pub fn remove_option(&self, index: usize) -> Result<Option<Value>> {
        Ok(self.form.remove_item("opcoes", index)?)
    }

    /// Press "Save".
    pub fn submit(&mut self) -> SubmitAttempt {
        self.controller.submit()
    }

    /// Deliver the save response.
    pub fn resolve_submit(
        &mut self,
        token: FetchToken,
        result: std::result::Result<Value, FetchError>,
    ) -> bool {
        self.controller.resolve(token, result)
    }

    /// Open item `id` for editing.
    pub fn load(&mut self, id: &str) -> FetchToken {
        self.controller.set_mode(SubmitMode::Update(id.to_string()));
        self.loader.load(id)
    }

    /// Deliver the load response.
    pub fn resolve_load(
        &mut self,
        token: FetchToken,
        result: std::result::Result<Value, FetchError>,
    ) -> Result<bool> {
        Ok(self.loader.resolve(token, result, &self.form)?)
    }

    /// Reload `view` after every successful save.
    pub fn refresh_on_success(&mut self, view: impl Refresh + 'static) {
        self.controller.refresh_on_success(view);
    }

    /// Everything the data source confirmed as saved.
    #[must_use]
    pub fn saved(&self) -> Vec<Value> {
        self.saved.borrow().clone()
    }

    #[must_use]
    pub fn form(&self) -> &Form {
        &self.form
    }

    #[must_use]
    pub fn controller(&self) -> &SubmissionController<JsonProjection> {
        &self.controller
    }

    #[must_use]
    pub fn loader(&self) -> &EntityLoader<JsonProjection> {
        &self.loader
    }

    /// Every error shown for `field`, including cross-field failures.
    pub fn errors(&self, field: &str) -> Result<Vec<ValidationError>> {
        Ok(self.form.errors_for(field)?)
    }
}

impl Screen for AdditiveFormScreen {
    fn title(&self) -> &'static str {
        "Additive item"
    }

    fn view(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{} ({}) | {:?}",
            self.title(),
            self.controller.mode(),
            self.controller.status()
        )];
        for banner in [self.loader.banner(), self.controller.banner()].into_iter().flatten() {
            let mark = if banner.is_error() { "!!" } else { "ok" };
            lines.push(format!("  [{mark}] {}", banner.message));
        }
        for field in FIELDS {
            let value = self.form.get(field).unwrap_or_default();
            lines.push(format!("  {field:<18} {value}"));
            lines.extend(error_lines(&self.form, field));
        }
        let options = self.form.items("opcoes").unwrap_or_default();
        lines.push(format!("  opcoes             {} item(s)", options.len()));
        for option in &options {
            lines.push(format!("    - {} ({})", option["nome"], option["preco"]));
        }
        if let Some(reason) = self.controller.last_block() {
            lines.push(format!("  ! {}", reason.user_message()));
        }
        lines
    }
}
