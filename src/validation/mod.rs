//! Validation Component
//!
//! Client-side mirror of the browser's constraint validation (required,
//! pattern, min/max, minlength). Field checks run on blur, are re-run while
//! the user corrects an erroring field, and gate submission.
//!
//! If the page already carries a server-rendered error summary the
//! component stays disabled so server errors are never overwritten.

mod evaluator;
mod presenter;
mod registry;

pub use evaluator::{
    js_number, Constraint, ConstraintResult, ConstraintRule, Evaluator, FieldValidity, MaxRule,
    MinLengthRule, MinRule, PatternRule, RequiredRule,
};
pub use presenter::Presenter;
pub use registry::ErrorRegistry;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::component::{Component, ComponentError, EventBinding, EventKind, UiEvent};
use crate::config::ValidationConfig;
use crate::dom::{Document, NodeId, FIELD_TAGS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationState {
    Enabled,
    /// Server-rendered errors were present at load; nothing is evaluated.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationHandler {
    Blur,
    Change,
    Submit,
}

const UI_EVENTS: &[EventBinding<ValidationHandler>] = &[
    EventBinding::new(EventKind::Blur, FIELD_TAGS, ValidationHandler::Blur),
    EventBinding::new(EventKind::Keyup, &["input", "textarea"], ValidationHandler::Change),
    EventBinding::new(EventKind::Change, &["select"], ValidationHandler::Change),
    EventBinding::new(EventKind::Submit, &[], ValidationHandler::Submit),
];

pub struct Validation {
    root: NodeId,
    state: ValidationState,
    config: ValidationConfig,
    evaluator: Evaluator,
    presenter: Presenter,
    errors: ErrorRegistry,
    /// Fields in document order, captured at initialization.
    fields: Vec<(NodeId, String)>,
}

impl Validation {
    pub fn state(&self) -> ValidationState {
        self.state
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn errors(&self) -> &ErrorRegistry {
        &self.errors
    }

    pub fn fields(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.fields.iter().map(|(node, _)| *node)
    }

    pub fn is_summary_visible(&self, doc: &Document) -> bool {
        self.presenter.is_summary_visible(doc, self.root)
    }

    /// Evaluate one field, update the registry and re-render. Returns the
    /// fresh verdict, or `None` when the field is not tracked.
    pub fn check_field_validity(&mut self, doc: &mut Document, field: NodeId) -> Option<FieldValidity> {
        if self.state == ValidationState::Disabled {
            return None;
        }
        let validity = self.update(doc, field)?;
        self.render(doc);
        Some(validity)
    }

    /// Evaluate every field as a submit would, without touching summary
    /// visibility. Returns the number of fields in error.
    pub fn validate_all(&mut self, doc: &mut Document) -> usize {
        if self.state == ValidationState::Disabled {
            return 0;
        }
        let fields: Vec<NodeId> = self.fields().collect();
        for field in fields {
            self.update(doc, field);
        }
        self.render(doc);
        self.errors.count()
    }

    fn update(&mut self, doc: &mut Document, field: NodeId) -> Option<FieldValidity> {
        let field_id = self
            .fields
            .iter()
            .find(|(node, _)| *node == field)
            .map(|(_, id)| id.clone())?;

        let validity = self.evaluator.evaluate(doc, field);
        // Fields sharing an id share one record, so their markers follow the latest verdict
        let namesakes: Vec<NodeId> = self
            .fields
            .iter()
            .filter(|(_, id)| *id == field_id)
            .map(|(node, _)| *node)
            .collect();
        for node in namesakes {
            self.presenter.annotate(doc, node, validity.has_error);
        }
        if validity.has_error {
            self.errors.upsert(validity.clone());
        } else {
            self.errors.remove(&field_id);
        }
        Some(validity)
    }

    fn render(&self, doc: &mut Document) {
        self.presenter.render_inline(doc, self.root, &self.errors);
        self.presenter.render_summary(doc, self.root, &self.errors);
    }

    fn handle_blur(&mut self, doc: &mut Document, event: &UiEvent) {
        self.check_field_validity(doc, event.target);
    }

    // Only fields already in error are re-checked while typing
    fn handle_change(&mut self, doc: &mut Document, event: &UiEvent) {
        let in_error = doc
            .attr(event.target, "id")
            .map_or(false, |id| self.errors.contains(id));
        if in_error {
            self.check_field_validity(doc, event.target);
        }
    }

    fn handle_submit(&mut self, doc: &mut Document, event: &mut UiEvent) {
        let count = self.validate_all(doc);
        if count > 0 {
            debug!(errors = count, "blocking submit");
            event.prevent_default();
            self.presenter.show_summary(doc, self.root);
        } else {
            debug!("allowing submit");
        }
    }
}

impl Component for Validation {
    const NAME: &'static str = "Validation";
    type Config = ValidationConfig;
    type Handler = ValidationHandler;

    fn initialize(doc: &mut Document, root: NodeId, config: ValidationConfig) -> Result<Self, ComponentError> {
        if !doc.is_element(root) {
            return Err(ComponentError::InvalidRoot(root));
        }

        let presenter = Presenter::new(config.clone());
        let server_errors = presenter.summary_entry_count(doc, root);
        let state = if server_errors > 0 {
            info!(entries = server_errors, "server-rendered errors present, validation disabled");
            ValidationState::Disabled
        } else {
            presenter.bootstrap(doc, root);
            ValidationState::Enabled
        };

        let mut fields = vec![];
        for node in doc.find_by_tags(root, FIELD_TAGS) {
            match doc.attr(node, "id") {
                Some(id) if !id.is_empty() => fields.push((node, id.to_string())),
                _ => warn!(field = %node, "field has no id and will not be validated"),
            }
        }

        Ok(Self {
            root,
            state,
            evaluator: Evaluator::new(&config),
            presenter,
            errors: ErrorRegistry::new(fields.iter().map(|(_, id)| id.clone()).collect()),
            fields,
            config,
        })
    }

    fn ui_events() -> &'static [EventBinding<ValidationHandler>] {
        UI_EVENTS
    }

    fn root(&self) -> NodeId {
        self.root
    }

    fn handle(&mut self, handler: ValidationHandler, doc: &mut Document, event: &mut UiEvent) {
        if self.state == ValidationState::Disabled {
            return;
        }
        match handler {
            ValidationHandler::Blur => self.handle_blur(doc, event),
            ValidationHandler::Change => self.handle_change(doc, event),
            ValidationHandler::Submit => self.handle_submit(doc, event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::dispatch;

    const FORM: &str = r#"<form id="form" data-dough-component="Validation">
        <div class="form__row">
            <select id="choice" required data-dough-validation-empty="Choose one">
                <option value="">--</option><option value="a">A</option>
            </select>
        </div>
        <div class="form__row"><input required data-dough-validation-empty="Anonymous"></div>
    </form>"#;

    fn mount(markup: &str) -> (Document, Validation) {
        let mut doc = Document::parse(markup);
        let form = doc.element_by_id("form").unwrap();
        let validation = Validation::initialize(&mut doc, form, ValidationConfig::default()).unwrap();
        (doc, validation)
    }

    #[test]
    fn test_fields_without_id_are_skipped() {
        let (_doc, validation) = mount(FORM);
        assert_eq!(validation.fields().count(), 1);
        assert_eq!(validation.errors().field_order(), ["choice".to_string()]);
    }

    #[test]
    fn test_select_revalidates_on_change_only_when_in_error() {
        let (mut doc, mut validation) = mount(FORM);
        let choice = doc.element_by_id("choice").unwrap();

        // Not yet in error: change is ignored
        assert!(dispatch(&mut validation, &mut doc, &mut UiEvent::new(EventKind::Change, choice)));
        assert!(validation.errors().is_empty());

        dispatch(&mut validation, &mut doc, &mut UiEvent::new(EventKind::Blur, choice));
        assert!(validation.errors().contains("choice"));

        doc.set_value(choice, "a");
        dispatch(&mut validation, &mut doc, &mut UiEvent::new(EventKind::Change, choice));
        assert!(validation.errors().is_empty());
    }

    #[test]
    fn test_textarea_revalidates_on_keyup_only_when_in_error() {
        let (mut doc, mut validation) = mount(
            r#"<form id="form">
                <div class="form__row">
                    <textarea id="notes" minlength="5" data-dough-validation-invalid="Say more"></textarea>
                </div>
            </form>"#,
        );
        let notes = doc.element_by_id("notes").unwrap();

        doc.set_value(notes, "abc");
        assert!(dispatch(&mut validation, &mut doc, &mut UiEvent::new(EventKind::Keyup, notes)));
        assert!(validation.errors().is_empty());

        dispatch(&mut validation, &mut doc, &mut UiEvent::new(EventKind::Blur, notes));
        assert_eq!(validation.errors().get("notes").map(|r| r.message.as_str()), Some("Say more"));
        assert_eq!(doc.attr(notes, "aria-invalid"), Some("true"));

        doc.set_value(notes, "abcdef");
        dispatch(&mut validation, &mut doc, &mut UiEvent::new(EventKind::Keyup, notes));
        assert!(validation.errors().is_empty());
        assert!(doc.element_by_id("error-notes").is_none());
        assert_eq!(doc.attr(notes, "aria-invalid"), None);
    }

    #[test]
    fn test_repeated_keyups_do_not_grow_the_page() {
        let (mut doc, mut validation) = mount(
            r#"<form id="form">
                <div class="form__row"><input id="code" minlength="4" data-dough-validation-invalid="Too short"></div>
            </form>"#,
        );
        let code = doc.element_by_id("code").unwrap();
        doc.set_value(code, "ab");
        dispatch(&mut validation, &mut doc, &mut UiEvent::new(EventKind::Blur, code));
        let before = doc.allocated();

        for _ in 0..1000 {
            dispatch(&mut validation, &mut doc, &mut UiEvent::new(EventKind::Keyup, code));
        }

        assert!(validation.errors().contains("code"));
        assert_eq!(doc.allocated(), before);
        assert_eq!(doc.text_content(doc.element_by_id("error-code").unwrap()), "Too short");
    }

    #[test]
    fn test_keyup_is_not_bound_to_select() {
        let (mut doc, mut validation) = mount(FORM);
        let choice = doc.element_by_id("choice").unwrap();
        assert!(!dispatch(&mut validation, &mut doc, &mut UiEvent::new(EventKind::Keyup, choice)));
    }

    #[test]
    fn test_validate_all_does_not_reveal_summary() {
        let (mut doc, mut validation) = mount(FORM);
        assert_eq!(validation.validate_all(&mut doc), 1);
        assert!(!validation.is_summary_visible(&doc));
    }

    #[test]
    fn test_invalid_root() {
        let mut doc = Document::parse(FORM);
        let root = doc.root();
        let result = Validation::initialize(&mut doc, root, ValidationConfig::default());
        assert!(matches!(result, Err(ComponentError::InvalidRoot(_))));
    }
}
