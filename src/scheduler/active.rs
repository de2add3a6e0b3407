use serde::Deserialize;
use std::collections::BTreeMap;

/// How a note-off treats a note that is currently on more than once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteOffPolicy {
    /// Releases a single instance; a retriggered note needs one off per on.
    #[default]
    RemoveOne,
    /// Releases every instance at once.
    RemoveAll,
}

/// Counted multiset of sounding notes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActiveSet {
    counts: BTreeMap<u8, u32>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, note: u8) {
        *self.counts.entry(note).or_insert(0) += 1;
    }

    /// Returns how many instances were released.
    pub fn release(&mut self, note: u8, policy: NoteOffPolicy) -> u32 {
        let Some(count) = self.counts.get_mut(&note) else {
            return 0;
        };
        let released = match policy {
            NoteOffPolicy::RemoveOne => 1,
            NoteOffPolicy::RemoveAll => *count,
        };
        *count -= released;
        if *count == 0 {
            self.counts.remove(&note);
        }
        released
    }

    pub fn contains(&self, note: u8) -> bool {
        self.counts.contains_key(&note)
    }

    pub fn count(&self, note: u8) -> u32 {
        self.counts.get(&note).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Distinct active notes, ascending.
    pub fn notes(&self) -> Vec<u8> {
        self.counts.keys().copied().collect()
    }
}
