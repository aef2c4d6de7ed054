//! Load → edit → submit flows across the loader, the form and the
//! submission controller.

use std::cell::RefCell;
use std::rc::Rc;

use painel_forms::validation::{ERROR_CODE_NUMBER, Validator};
use painel_forms::{
    Coercion, DataSource, EntityLoader, FetchError, FieldValue, Form, FormProjection,
    JsonProjection, ListParams, LoaderConfig, Navigator, RuleSet, SubmissionController,
    SubmitAttempt, SubmitMode, SubmitStatus,
};
use painel_runtime::{CollectionConfig, CollectionView, DerivationGraph, FetchToken};
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    List(FetchToken),
    Get(String, FetchToken),
    Create(Value, FetchToken),
    Update(String, Value, FetchToken),
}

#[derive(Default)]
struct Recorder {
    calls: RefCell<Vec<Call>>,
}

impl Recorder {
    fn last(&self) -> Call {
        self.calls.borrow().last().cloned().unwrap()
    }
}

impl DataSource for Recorder {
    fn list(&self, _: &ListParams, token: FetchToken) {
        self.calls.borrow_mut().push(Call::List(token));
    }
    fn get(&self, id: &str, token: FetchToken) {
        self.calls.borrow_mut().push(Call::Get(id.into(), token));
    }
    fn create(&self, payload: &Value, token: FetchToken) {
        self.calls.borrow_mut().push(Call::Create(payload.clone(), token));
    }
    fn update(&self, id: &str, payload: &Value, token: FetchToken) {
        self.calls
            .borrow_mut()
            .push(Call::Update(id.into(), payload.clone(), token));
    }
}

struct NoNav;

impl Navigator for NoNav {
    fn go_to(&self, _: &str) {}
}

fn projection() -> JsonProjection {
    JsonProjection::new()
        .field("nome", Coercion::Text)
        .field("preco", Coercion::Number)
        .field("ativo", Coercion::Bool)
        .select("categoria", "id_categoria")
        .list("opcoes", "opcoes")
}

fn form(graph: &DerivationGraph) -> Form {
    let rules = RuleSet::new()
        .field("nome", [Validator::Required, Validator::MaxLength(40)])
        .field("preco", [Validator::Required, Validator::Min(0.0)])
        .field_with("ativo", true, [])
        .field("categoria", [Validator::Required])
        .list("opcoes", true);
    Form::new(graph, rules).unwrap()
}

#[test]
fn round_trip_entity_form_payload() {
    let graph = DerivationGraph::new();
    let form = form(&graph);
    let source = Rc::new(Recorder::default());
    let mut loader = EntityLoader::new(
        projection(),
        Rc::clone(&source) as Rc<dyn DataSource>,
        Rc::new(NoNav),
        LoaderConfig::default(),
    );

    let entity = json!({
        "nome": "Borda recheada",
        "preco": 12,
        "ativo": false,
        "id_categoria": 4,
        "opcoes": [{"nome": "Catupiry"}, {"nome": "Cheddar"}],
    });
    let token = loader.load("31");
    assert_eq!(source.last(), Call::Get("31".into(), token));
    assert!(loader.resolve(token, Ok(entity.clone()), &form).unwrap());

    assert_eq!(form.get("categoria").unwrap(), FieldValue::text("4"));
    assert!(form.is_valid());
    assert_eq!(projection().to_payload(&form.snapshot()), entity);
}

#[test]
fn edit_then_update_after_load() {
    let graph = DerivationGraph::new();
    let form = form(&graph);
    let source = Rc::new(Recorder::default());
    let mut loader = EntityLoader::new(
        projection(),
        Rc::clone(&source) as Rc<dyn DataSource>,
        Rc::new(NoNav),
        LoaderConfig::default(),
    );
    let token = loader.load("31");
    loader
        .resolve(
            token,
            Ok(json!({"nome": "Borda", "preco": 10, "ativo": true, "id_categoria": 4,
                      "opcoes": [{"nome": "Catupiry"}]})),
            &form,
        )
        .unwrap();
    assert!(form.is_pristine());

    let list = CollectionView::new(
        &graph,
        Vec::<String>::new(),
        |s: &String| s.as_str(),
        CollectionConfig::default(),
    );
    let list_source = Rc::clone(&source);
    list.set_fetcher(move |token| list_source.list(&ListParams::new(), token));

    let mut controller = SubmissionController::new(
        form.clone(),
        projection(),
        Rc::clone(&source) as Rc<dyn DataSource>,
        SubmitMode::Update("31".into()),
    );
    controller.refresh_on_success(list.clone());

    form.set("preco", "11.5").unwrap();
    assert!(form.is_dirty());

    let SubmitAttempt::Dispatched(token) = controller.submit() else {
        panic!("expected dispatch");
    };
    let Call::Update(id, payload, sent) = source.last() else {
        panic!("expected update");
    };
    assert_eq!((id.as_str(), sent), ("31", token));
    assert_eq!(payload["preco"], json!(11.5));
    assert_eq!(payload["id_categoria"], json!(4));

    controller.resolve(token, Ok(payload));
    assert_eq!(controller.status(), SubmitStatus::Idle);
    assert!(matches!(source.last(), Call::List(_)));
    assert!(list.is_loading());
}

#[test]
fn removing_last_option_blocks_submit() {
    let graph = DerivationGraph::new();
    let form = form(&graph);
    form.set("nome", "Borda").unwrap();
    form.set("preco", "10").unwrap();
    form.set("categoria", FieldValue::id(4)).unwrap();
    form.push_item("opcoes", json!({"nome": "Catupiry"})).unwrap();

    let source = Rc::new(Recorder::default());
    let mut controller = SubmissionController::new(
        form.clone(),
        projection(),
        Rc::clone(&source) as Rc<dyn DataSource>,
        SubmitMode::Create,
    );

    form.remove_item("opcoes", 0).unwrap();
    assert!(matches!(
        controller.submit(),
        SubmitAttempt::Blocked(painel_forms::BlockReason::EmptyCollection(_))
    ));
    assert!(source.calls.borrow().is_empty());

    form.push_item("opcoes", json!({"nome": "Cheddar"})).unwrap();
    let SubmitAttempt::Dispatched(token) = controller.submit() else {
        panic!("expected dispatch");
    };
    controller.resolve(token, Err(FetchError::Domain {
        code: "duplicate".into(),
        message: "Já existe um adicional com esse nome".into(),
    }));
    assert_eq!(
        controller.banner().unwrap().message,
        "Could not save: Já existe um adicional com esse nome"
    );
    assert_eq!(form.items("opcoes").unwrap().len(), 1);
}

#[test]
fn blank_and_float_fields_round_trip() {
    let graph = DerivationGraph::new();
    let rules = RuleSet::new()
        .field("nome", [])
        .field("obs", [])
        .field("preco", []);
    let form = Form::new(&graph, rules).unwrap();
    let projection = JsonProjection::new()
        .field("nome", Coercion::Text)
        .field("obs", Coercion::Text)
        .field("preco", Coercion::Number);
    let source = Rc::new(Recorder::default());
    let mut loader = EntityLoader::new(
        projection.clone(),
        Rc::clone(&source) as Rc<dyn DataSource>,
        Rc::new(NoNav),
        LoaderConfig::default(),
    );

    let entity = json!({"nome": "", "obs": "  ", "preco": 2.5});
    let token = loader.load("8");
    assert!(loader.resolve(token, Ok(entity.clone()), &form).unwrap());
    assert_eq!(projection.to_payload(&form.snapshot()), entity);

    let token = loader.load("9");
    loader
        .resolve(token, Ok(json!({"nome": "x", "obs": "", "preco": 2.0})), &form)
        .unwrap();
    let payload = projection.to_payload(&form.snapshot());
    assert_eq!(payload["obs"], json!(""));
    assert_eq!(payload["preco"].as_f64(), Some(2.0));
}

#[test]
fn non_finite_price_never_dispatches() {
    let graph = DerivationGraph::new();
    let form = form(&graph);
    form.set("nome", "Borda").unwrap();
    form.set("categoria", "4").unwrap();
    form.push_item("opcoes", json!({"nome": "Catupiry"})).unwrap();

    let source = Rc::new(Recorder::default());
    let mut controller = SubmissionController::new(
        form.clone(),
        projection(),
        Rc::clone(&source) as Rc<dyn DataSource>,
        SubmitMode::Create,
    );

    for text in ["NaN", "inf", "-Infinity"] {
        form.set("preco", text).unwrap();
        assert_eq!(
            form.field_errors("preco").unwrap()[0].code,
            ERROR_CODE_NUMBER,
            "{text}"
        );
        assert!(matches!(controller.submit(), SubmitAttempt::Blocked(_)));
    }
    assert!(source.calls.borrow().is_empty());

    form.set("preco", "12.5").unwrap();
    assert!(matches!(controller.submit(), SubmitAttempt::Dispatched(_)));
    assert_eq!(source.calls.borrow().len(), 1);
}
