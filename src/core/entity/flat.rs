// ─── Flat Entity Projection ───
// All providers' entities in registration order, as one row list.

use super::model::Entity;
use crate::core::events::{ListChange, Subscribers};

#[derive(Debug, Default)]
pub struct FlatEntityList {
    rows: Vec<Entity>,
    changes: Subscribers<ListChange>,
}

impl FlatEntityList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Entity] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn changes(&mut self) -> &mut Subscribers<ListChange> {
        &mut self.changes
    }

    pub fn position(&self, provider: &str, internal_id: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|e| e.provider == provider && e.internal_id == internal_id)
    }

    pub(crate) fn insert(&mut self, index: usize, entities: Vec<Entity>) {
        let index = index.min(self.rows.len());
        let count = entities.len();
        self.rows.splice(index..index, entities);
        if let Some(change) = ListChange::inserted(index, count) {
            self.changes.emit(&change);
        }
    }

    pub(crate) fn remove(&mut self, first: usize, count: usize) {
        if first >= self.rows.len() {
            return;
        }
        let end = first.saturating_add(count).min(self.rows.len());
        self.rows.drain(first..end);
        if let Some(change) = ListChange::removed(first, end - first) {
            self.changes.emit(&change);
        }
    }

    pub(crate) fn mark_changed(&mut self, index: usize, fields: Vec<&'static str>) {
        if index < self.rows.len() {
            self.changes.emit(&ListChange::Changed {
                first: index,
                last: index,
                fields,
            });
        }
    }
}
