//! Dialogue slot state with confirmation-safe rollback.
//!
//! Slots are tentatively written during a turn and resolved at the next
//! epoch transition: committed if the prior epoch spoke (the conversational
//! commitment was made), rolled back if it never emitted a segment. Which
//! keys exist is the dialogue policy collaborator's business; the machine
//! only owns the tentative/committed lifecycle.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SlotStore {
    committed: HashMap<String, String>,
    tentative: HashMap<String, String>,
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tentative write; visible to reads until rolled back.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tentative.insert(key.into(), value.into());
    }

    /// Tentative values shadow committed ones.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tentative
            .get(key)
            .or_else(|| self.committed.get(key))
            .map(String::as_str)
    }

    /// Promote all tentative writes (the prior epoch spoke).
    pub fn commit(&mut self) {
        for (k, v) in self.tentative.drain() {
            self.committed.insert(k, v);
        }
    }

    /// Discard tentative writes (the prior epoch never spoke).
    pub fn rollback(&mut self) {
        self.tentative.clear();
    }

    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }
}
