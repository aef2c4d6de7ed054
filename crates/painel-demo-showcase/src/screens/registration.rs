#![forbid(unsafe_code)]

//! Account registration with password confirmation.

use std::rc::Rc;

use painel::{
    Coercion, CrossFieldRule, DataSource, DerivationGraph, FetchError, FetchToken, Form,
    JsonProjection, Result, RuleSet, SubmissionController, SubmitAttempt, SubmitConfig, SubmitMode,
    Validator,
};
use serde_json::Value;

use super::{Screen, error_lines};

const FIELDS: [&str; 5] = ["nome", "email", "telefone", "senha", "confirmarSenha"];

/// Rule set of the registration form.
///
/// Fails only if a built-in pattern does not compile.
pub fn rules() -> Result<RuleSet> {
    Ok(RuleSet::new()
        .field("nome", [Validator::Required, Validator::MinLength(3)])
        .field(
            "email",
            [
                Validator::Required,
                Validator::pattern(r"[^@\s]+@[^@\s]+\.[^@\s]+")?,
            ],
        )
        .field("telefone", [Validator::pattern(r"\(?\d{2}\)?\s?\d{4,5}-?\d{4}")?])
        .field(
            "senha",
            [
                Validator::Required,
                Validator::MinLength(8),
                Validator::custom(
                    "weak_password",
                    "Use letters and digits",
                    |value, _| {
                        let text = value.as_text();
                        text.is_empty()
                            || (text.chars().any(char::is_alphabetic)
                                && text.chars().any(|c| c.is_ascii_digit()))
                    },
                ),
            ],
        )
        .field("confirmarSenha", [Validator::Required])
        .cross(CrossFieldRule::matches("confirmarSenha", "senha")))
}

/// Payload mapping. The confirmation never leaves the form.
#[must_use]
pub fn projection() -> JsonProjection {
    JsonProjection::new()
        .field("nome", Coercion::Text)
        .field("email", Coercion::Text)
        .field("telefone", Coercion::Text)
        .field("senha", Coercion::Text)
        .skip_empty()
}

/// The registration screen.
pub struct RegistrationScreen {
    form: Form,
    controller: SubmissionController<JsonProjection>,
}

impl RegistrationScreen {
    pub fn new(graph: &DerivationGraph, source: Rc<dyn DataSource>) -> Result<Self> {
        let form = Form::new(graph, rules()?)?;
        let controller =
            SubmissionController::new(form.clone(), projection(), source, SubmitMode::Create)
                .with_config(
                    SubmitConfig::default()
                        .success_message("Account created.")
                        .failure_prefix("Could not register"),
                );
        Ok(Self { form, controller })
    }

    /// Type a value into `field` (write and touch).
    pub fn input(&self, field: &str, value: &str) -> Result<()> {
        self.form.set(field, value)?;
        self.form.touch(field)?;
        Ok(())
    }

    /// Press "Register".
    pub fn submit(&mut self) -> SubmitAttempt {
        self.controller.submit()
    }

    /// Deliver the create response.
    pub fn resolve(
        &mut self,
        token: FetchToken,
        result: std::result::Result<Value, FetchError>,
    ) -> bool {
        self.controller.resolve(token, result)
    }

    #[must_use]
    pub fn form(&self) -> &Form {
        &self.form
    }

    #[must_use]
    pub fn controller(&self) -> &SubmissionController<JsonProjection> {
        &self.controller
    }
}

impl Screen for RegistrationScreen {
    fn title(&self) -> &'static str {
        "Registration"
    }

    fn view(&self) -> Vec<String> {
        let mut lines = vec![format!("{} | {:?}", self.title(), self.controller.status())];
        if let Some(banner) = self.controller.banner() {
            let mark = if banner.is_error() { "!!" } else { "ok" };
            lines.push(format!("  [{mark}] {}", banner.message));
        }
        for field in FIELDS {
            let value = self.form.get(field).unwrap_or_default();
            let shown = if matches!(field, "senha" | "confirmarSenha") {
                "*".repeat(value.as_text().chars().count())
            } else {
                value.to_string()
            };
            lines.push(format!("  {field:<15} {shown}"));
            lines.extend(error_lines(&self.form, field));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemorySource, Request};
    use painel::forms::validation::ERROR_CODE_MISMATCH;
    use serde_json::json;

    fn setup() -> (RegistrationScreen, Rc<InMemorySource>) {
        let source = Rc::new(InMemorySource::new("email").unique("email"));
        let screen = RegistrationScreen::new(
            &DerivationGraph::new(),
            Rc::clone(&source) as Rc<dyn DataSource>,
        )
        .unwrap();
        (screen, source)
    }

    fn fill(screen: &RegistrationScreen, senha: &str, confirmacao: &str) {
        screen.input("nome", "Ana Souza").unwrap();
        screen.input("email", "ana@example.com").unwrap();
        screen.input("senha", senha).unwrap();
        screen.input("confirmarSenha", confirmacao).unwrap();
    }

    #[test]
    fn matching_passwords_pass() {
        let (screen, _) = setup();
        fill(&screen, "Abc12345", "Abc12345");
        assert!(screen.form().is_valid());
    }

    #[test]
    fn mismatch_is_reported_on_both_fields() {
        let (screen, _) = setup();
        fill(&screen, "Abc12345", "Abc12346");
        assert!(!screen.form().is_valid());
        for field in ["senha", "confirmarSenha"] {
            let codes: Vec<_> = screen
                .form()
                .errors_for(field)
                .unwrap()
                .iter()
                .map(|e| e.code)
                .collect();
            assert!(codes.contains(&ERROR_CODE_MISMATCH), "{field}: {codes:?}");
        }
    }

    #[test]
    fn mismatch_fails_even_when_each_field_is_invalid() {
        let (screen, _) = setup();
        fill(&screen, "abc", "abd");
        assert!(
            screen
                .form()
                .cross_errors()
                .iter()
                .any(|f| f.code == ERROR_CODE_MISMATCH)
        );
    }

    #[test]
    fn pattern_is_anchored() {
        let (screen, _) = setup();
        screen.input("email", "ana@example.com and more").unwrap();
        assert!(!screen.form().field_errors("email").unwrap().is_empty());
        screen.input("telefone", "(11) 91234-5678").unwrap();
        assert!(screen.form().field_errors("telefone").unwrap().is_empty());
    }

    #[test]
    fn payload_omits_confirmation() {
        let (mut screen, source) = setup();
        fill(&screen, "Abc12345", "Abc12345");
        assert!(matches!(screen.submit(), SubmitAttempt::Dispatched(_)));
        let Some(Request::Create { payload, .. }) = source.take_next() else {
            panic!("expected create");
        };
        assert_eq!(
            payload,
            json!({"nome": "Ana Souza", "email": "ana@example.com", "senha": "Abc12345"})
        );
    }

    #[test]
    fn password_is_masked() {
        let (screen, _) = setup();
        fill(&screen, "Abc12345", "Abc12345");
        assert!(screen.view().iter().all(|l| !l.contains("Abc12345")));
    }
}
