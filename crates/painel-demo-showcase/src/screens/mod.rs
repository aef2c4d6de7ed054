#![forbid(unsafe_code)]

//! Demo screens.
//!
//! Each screen owns its cells and collaborators and renders to plain text
//! lines, so the binary and the tests can inspect what a user would see.

pub mod additive_form;
pub mod cuisine_list;
pub mod registration;

/// Common interface for all demo screens.
pub trait Screen {
    /// Title shown above the screen.
    fn title(&self) -> &'static str;

    /// Render the current state as text lines.
    fn view(&self) -> Vec<String>;
}

/// Render a field's visible errors as indented lines.
pub(crate) fn error_lines(form: &painel::Form, field: &str) -> Vec<String> {
    form.visible_errors(field)
        .unwrap_or_default()
        .iter()
        .map(|err| format!("    ! {}", err.format_message()))
        .collect()
}
