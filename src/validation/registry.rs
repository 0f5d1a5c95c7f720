//! Error Registry - current error records in page order

use std::collections::HashSet;
use tracing::{debug, warn};

use super::evaluator::FieldValidity;

/// Ordered error records, unique by field id.
///
/// The order always follows the field order captured at construction, never
/// insertion order. When several fields share an id they share one record:
/// the latest evaluation wins and the record sits at the first such field.
#[derive(Debug, Clone, Default)]
pub struct ErrorRegistry {
    field_order: Vec<String>,
    records: Vec<FieldValidity>,
}

impl ErrorRegistry {
    pub fn new(field_order: Vec<String>) -> Self {
        Self {
            field_order,
            records: vec![],
        }
    }

    /// Insert or replace the record for `validity.field_id`, then re-sort.
    pub fn upsert(&mut self, validity: FieldValidity) {
        debug!(field = %validity.field_id, message = %validity.message, "registering error");
        match self.records.iter_mut().find(|r| r.field_id == validity.field_id) {
            Some(existing) => *existing = validity,
            None => self.records.push(validity),
        }
        self.sort();
    }

    pub fn remove(&mut self, field_id: &str) {
        let before = self.records.len();
        self.records.retain(|r| r.field_id != field_id);
        if self.records.len() != before {
            debug!(field = field_id, "clearing error");
        }
        self.sort();
    }

    pub fn get(&self, field_id: &str) -> Option<&FieldValidity> {
        self.records.iter().find(|r| r.field_id == field_id)
    }

    pub fn contains(&self, field_id: &str) -> bool {
        self.get(field_id).is_some()
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ordered_entries(&self) -> &[FieldValidity] {
        &self.records
    }

    pub fn field_order(&self) -> &[String] {
        &self.field_order
    }

    // Rebuild the sequence by walking the page's fields in document order.
    fn sort(&mut self) {
        let mut seen = HashSet::new();
        let mut sorted = Vec::with_capacity(self.records.len());

        for field_id in &self.field_order {
            if !seen.insert(field_id.as_str()) {
                continue;
            }
            if let Some(pos) = self.records.iter().position(|r| &r.field_id == field_id) {
                sorted.push(self.records.swap_remove(pos));
            }
        }

        for orphan in &self.records {
            warn!(field = %orphan.field_id, "dropping error for a field outside the page order");
        }
        self.records = sorted;
    }
}
