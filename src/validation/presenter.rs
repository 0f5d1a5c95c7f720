//! DOM Error Presenter
//!
//! Writes inline errors, the summary list and accessibility attributes. Every
//! render rebuilds its target from the registry; nothing is diffed.

use std::collections::HashSet;

use crate::config::ValidationConfig;
use crate::dom::{Document, NodeId, FIELD_TAGS};

use super::registry::ErrorRegistry;

const ARIA_INVALID: &str = "aria-invalid";
const ARIA_DESCRIBEDBY: &str = "aria-describedby";

pub struct Presenter {
    config: ValidationConfig,
}

impl Presenter {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn anchor_id(&self, field_id: &str) -> String {
        self.config.anchor_id(field_id)
    }

    fn rows(&self, doc: &Document, root: NodeId) -> Vec<NodeId> {
        doc.find_by_class(root, &self.config.row_class)
    }

    fn summaries(&self, doc: &Document, root: NodeId) -> Vec<NodeId> {
        doc.find_by_class(root, &self.config.validation_summary_class)
    }

    fn summary_lists(&self, doc: &Document, root: NodeId) -> Vec<NodeId> {
        doc.find_by_class(root, &self.config.validation_summary_list_class)
    }

    /// Number of entries already present in the summary list(s).
    pub fn summary_entry_count(&self, doc: &Document, root: NodeId) -> usize {
        self.summary_lists(doc, root)
            .into_iter()
            .map(|list| doc.find_by_tags(list, &["li"]).len())
            .sum()
    }

    /// One-time markup preparation: a hidden summary when the page has none,
    /// and an empty inline slot in every row lacking one.
    pub fn bootstrap(&self, doc: &mut Document, root: NodeId) {
        if self.summaries(doc, root).is_empty() {
            let summary = doc.create_element("div");
            doc.add_class(summary, &self.config.validation_summary_class);
            doc.add_class(summary, &self.config.validation_summary_hidden_class);
            let list = doc.create_element("ol");
            doc.add_class(list, &self.config.validation_summary_list_class);
            doc.append_child(summary, list);
            doc.prepend_child(root, summary);
        }

        for row in self.rows(doc, root) {
            if doc.find_by_class(row, &self.config.inline_error_class).is_empty() {
                let slot = doc.create_element("div");
                doc.add_class(slot, &self.config.inline_error_class);
                doc.prepend_child(row, slot);
            }
        }
    }

    pub fn render_inline(&self, doc: &mut Document, root: NodeId, registry: &ErrorRegistry) {
        for row in self.rows(doc, root) {
            let mut rendered = HashSet::new();
            let mut entries = vec![];

            for field in doc.find_by_tags(row, FIELD_TAGS) {
                let Some(field_id) = doc.attr(field, "id") else {
                    continue;
                };
                if let Some(record) = registry.get(field_id) {
                    if rendered.insert(field_id.to_string()) {
                        entries.push((record.field_id.clone(), record.message.clone()));
                    }
                }
            }

            for slot in doc.find_by_class(row, &self.config.inline_error_class) {
                doc.clear_children(slot);
                for (field_id, message) in &entries {
                    let p = doc.create_element("p");
                    doc.set_attr(p, "id", &self.anchor_id(field_id));
                    doc.add_class(p, &self.config.validation_summary_error_class);
                    let text = doc.create_text(message);
                    doc.append_child(p, text);
                    doc.append_child(slot, p);
                }
            }

            if entries.is_empty() {
                doc.remove_class(row, &self.config.row_invalid_class);
            } else {
                doc.add_class(row, &self.config.row_invalid_class);
            }
        }
    }

    /// Rebuild the summary list in registry order. Hides the summary when
    /// there is nothing to show; never reveals it.
    pub fn render_summary(&self, doc: &mut Document, root: NodeId, registry: &ErrorRegistry) {
        for list in self.summary_lists(doc, root) {
            doc.clear_children(list);
            for record in registry.ordered_entries() {
                let li = doc.create_element("li");
                doc.add_class(li, &self.config.validation_summary_error_class);
                let a = doc.create_element("a");
                doc.set_attr(a, "href", &format!("#{}", self.anchor_id(&record.field_id)));
                let text = doc.create_text(&record.message);
                doc.append_child(a, text);
                doc.append_child(li, a);
                doc.append_child(list, li);
            }
        }

        if registry.is_empty() {
            self.hide_summary(doc, root);
        }
    }

    /// Toggle the field's invalid marker and its `aria-describedby` link to
    /// the inline error.
    pub fn annotate(&self, doc: &mut Document, field: NodeId, has_error: bool) {
        let Some(field_id) = doc.attr(field, "id").map(str::to_string) else {
            return;
        };
        let anchor = self.anchor_id(&field_id);
        let mut described_by: Vec<String> = doc
            .attr(field, ARIA_DESCRIBEDBY)
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        if has_error {
            doc.set_attr(field, ARIA_INVALID, "true");
            doc.add_class(field, &self.config.invalid_class);
            if !described_by.contains(&anchor) {
                described_by.push(anchor);
            }
        } else {
            doc.remove_attr(field, ARIA_INVALID);
            doc.remove_class(field, &self.config.invalid_class);
            described_by.retain(|token| *token != anchor);
        }

        if described_by.is_empty() {
            doc.remove_attr(field, ARIA_DESCRIBEDBY);
        } else {
            doc.set_attr(field, ARIA_DESCRIBEDBY, &described_by.join(" "));
        }
    }

    pub fn show_summary(&self, doc: &mut Document, root: NodeId) {
        for summary in self.summaries(doc, root) {
            doc.remove_class(summary, &self.config.validation_summary_hidden_class);
        }
    }

    pub fn hide_summary(&self, doc: &mut Document, root: NodeId) {
        for summary in self.summaries(doc, root) {
            doc.add_class(summary, &self.config.validation_summary_hidden_class);
        }
    }

    pub fn is_summary_visible(&self, doc: &Document, root: NodeId) -> bool {
        self.summaries(doc, root)
            .into_iter()
            .any(|s| !doc.has_class(s, &self.config.validation_summary_hidden_class))
    }
}
