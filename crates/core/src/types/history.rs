//! Bounded, newest-first edit history.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::edit::AspectRatio;
use super::id::HistoryEntryId;
use super::media::ImageAsset;

/// Default number of entries kept per session.
pub const DEFAULT_HISTORY_CAPACITY: NonZeroUsize = match NonZeroUsize::new(50) {
    Some(n) => n,
    None => unreachable!(),
};

/// An immutable record of one successful edit.
///
/// Fields are private; there is no way to mutate an entry after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    id: HistoryEntryId,
    original: ImageAsset,
    processed: ImageAsset,
    prompt: String,
    aspect_ratio: AspectRatio,
    created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Record an edit that has just completed.
    #[must_use]
    pub fn new(
        original: ImageAsset,
        processed: ImageAsset,
        prompt: String,
        aspect_ratio: AspectRatio,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HistoryEntryId::generate(),
            original,
            processed,
            prompt,
            aspect_ratio,
            created_at,
        }
    }

    /// Entry identifier.
    #[must_use]
    pub const fn id(&self) -> HistoryEntryId {
        self.id
    }

    /// Image the edit started from.
    #[must_use]
    pub const fn original(&self) -> &ImageAsset {
        &self.original
    }

    /// Image the edit produced.
    #[must_use]
    pub const fn processed(&self) -> &ImageAsset {
        &self.processed
    }

    /// Instruction that produced the processed image.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Framing used for the edit.
    #[must_use]
    pub const fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    /// When the edit completed.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Ring buffer of [`HistoryEntry`] values, newest first.
///
/// When the buffer is full, recording a new entry evicts the oldest one.
#[derive(Debug, Clone)]
pub struct EditHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: NonZeroUsize,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl EditHistory {
    /// Create an empty history holding at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.get()),
            capacity,
        }
    }

    /// Prepend an entry, returning the evicted oldest entry if the buffer
    /// was full.
    pub fn record(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        let evicted = if self.entries.len() >= self.capacity.get() {
            self.entries.pop_back()
        } else {
            None
        };
        self.entries.push_front(entry);
        evicted
    }

    /// Entry at `index` (0 = newest).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Entry with the given id.
    #[must_use]
    pub fn find(&self, id: HistoryEntryId) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Iterate newest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no edit has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries retained.
    #[must_use]
    pub const fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(byte: u8) -> ImageAsset {
        ImageAsset::new("image/jpeg", vec![byte]).expect("image")
    }

    fn entry(prompt: &str) -> HistoryEntry {
        HistoryEntry::new(
            image(1),
            image(2),
            prompt.to_string(),
            AspectRatio::Portrait,
            Utc::now(),
        )
    }

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).expect("non-zero")
    }

    #[test]
    fn test_record_is_newest_first() {
        let mut history = EditHistory::default();
        history.record(entry("first"));
        history.record(entry("second"));

        let prompts: Vec<&str> = history.iter().map(HistoryEntry::prompt).collect();
        assert_eq!(prompts, ["second", "first"]);
        assert_eq!(history.latest().map(HistoryEntry::prompt), Some("second"));
    }

    #[test]
    fn test_record_evicts_oldest_when_full() {
        let mut history = EditHistory::with_capacity(capacity(2));
        assert!(history.record(entry("a")).is_none());
        assert!(history.record(entry("b")).is_none());

        let evicted = history.record(entry("c")).expect("evicted");
        assert_eq!(evicted.prompt(), "a");
        assert_eq!(history.len(), 2);

        let prompts: Vec<&str> = history.iter().map(HistoryEntry::prompt).collect();
        assert_eq!(prompts, ["c", "b"]);
    }

    #[test]
    fn test_find_by_id() {
        let mut history = EditHistory::default();
        let first = entry("first");
        let id = first.id();
        history.record(first);
        history.record(entry("second"));

        assert_eq!(history.find(id).map(HistoryEntry::prompt), Some("first"));
        assert!(history.find(HistoryEntryId::generate()).is_none());
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(EditHistory::default().capacity().get(), 50);
    }
}
