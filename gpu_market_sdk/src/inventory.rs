use std::collections::HashMap;

use crate::completion::CompletionEvent;
use crate::types::{Address, InventoryEntry};

/// GPUs owned per account for this session.
#[derive(Clone, Debug, Default)]
pub struct Inventory {
    by_owner: HashMap<Address, Vec<InventoryEntry>>,
}

impl Inventory {
    /// Adds `entry` unless the owner already holds the same
    /// (uuid, registration) pair. Returns whether anything changed.
    pub fn record(&mut self, owner: &Address, entry: InventoryEntry) -> bool {
        let owned = self.by_owner.entry(owner.clone()).or_default();
        if owned
            .iter()
            .any(|e| e.uuid == entry.uuid && e.registration == entry.registration)
        {
            return false;
        }
        owned.push(entry);
        true
    }

    pub fn record_completion(&mut self, event: &CompletionEvent) -> bool {
        self.record(&event.buyer, event.inventory_entry())
    }

    pub fn owned_by(&self, owner: &Address) -> &[InventoryEntry] {
        self.by_owner.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn owns(&self, owner: &Address, uuid: &str, registration: &Address) -> bool {
        self.owned_by(owner)
            .iter()
            .any(|e| e.uuid == uuid && &e.registration == registration)
    }

    pub fn total(&self) -> usize {
        self.by_owner.values().map(Vec::len).sum()
    }
}
