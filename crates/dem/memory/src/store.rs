use dem_types::{EventEntry, SlotIndex};

/// The flat array of entries shared by all banks.
#[derive(Clone, Debug, Default)]
pub struct EntryStore {
    entries: Vec<EventEntry>,
}

impl EntryStore {
    pub fn new(len: usize) -> Self {
        Self {
            entries: vec![EventEntry::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bounds-checked slot handle for a raw index.
    pub fn slot(&self, raw: usize) -> Option<SlotIndex> {
        SlotIndex::new(raw, self.entries.len())
    }

    pub fn get(&self, slot: SlotIndex) -> Option<&EventEntry> {
        self.entries.get(slot.get())
    }

    pub fn get_mut(&mut self, slot: SlotIndex) -> Option<&mut EventEntry> {
        self.entries.get_mut(slot.get())
    }

    /// Timestamp of an entry; 0 for slots outside the store.
    pub fn timestamp(&self, slot: SlotIndex) -> u32 {
        self.get(slot).map(|e| e.timestamp).unwrap_or(0)
    }

    pub fn entries(&self) -> &[EventEntry] {
        &self.entries
    }

    /// Copy a persisted image over the store.
    ///
    /// Copies the common prefix and frees any remaining slots. Returns the
    /// image length when it differs from the store length.
    pub fn load(&mut self, image: &[EventEntry]) -> Result<(), usize> {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            match image.get(index) {
                Some(persisted) => entry.clone_from(persisted),
                None => entry.clear(),
            }
        }
        if image.len() == self.entries.len() {
            Ok(())
        } else {
            Err(image.len())
        }
    }

    pub fn clear_all(&mut self) {
        self.entries.iter_mut().for_each(EventEntry::clear);
    }
}

#[cfg(test)]
mod tests {
    use dem_types::EventId;

    use super::*;

    #[test]
    fn slot_handles_are_bounded() {
        let store = EntryStore::new(2);
        assert!(store.slot(1).is_some());
        assert!(store.slot(2).is_none());
        assert!(store.get(store.slot(1).unwrap()).unwrap().is_free());
    }

    #[test]
    fn load_copies_prefix_and_reports_mismatch() {
        let mut store = EntryStore::new(3);
        let image = vec![
            EventEntry::allocated(EventId(1), 5),
            EventEntry::allocated(EventId(2), 6),
        ];
        assert_eq!(store.load(&image), Err(2));
        assert_eq!(store.entries()[0].event_id, Some(EventId(1)));
        assert_eq!(store.entries()[1].timestamp, 6);
        assert!(store.entries()[2].is_free());

        let full = vec![EventEntry::default(); 3];
        assert_eq!(store.load(&full), Ok(()));
        assert!(store.entries().iter().all(EventEntry::is_free));
    }
}
