use dem_types::{BankId, SlotIndex};

use crate::directory::BankDirectory;
use crate::error::MemoryFault;
use crate::store::EntryStore;

#[derive(Clone, Debug)]
struct BankOrder {
    bank: BankId,
    positions: Vec<Option<SlotIndex>>,
}

/// Per-bank ordering of occupied slots, oldest first.
///
/// Only positions `[0, current_size)` are meaningful; the caller passes the
/// bank's current size, which lives in the [`BankDirectory`].
#[derive(Clone, Debug)]
pub struct Chronology {
    banks: Vec<BankOrder>,
}

impl Chronology {
    pub fn new(directory: &BankDirectory) -> Self {
        let banks = directory
            .bank_ids()
            .map(|bank| BankOrder {
                bank,
                positions: vec![None; directory.max_size(bank)],
            })
            .collect();
        Self { banks }
    }

    fn order(&self, bank: BankId) -> Option<&[Option<SlotIndex>]> {
        self.banks
            .iter()
            .find(|b| b.bank == bank)
            .map(|b| b.positions.as_slice())
    }

    fn order_mut(&mut self, bank: BankId) -> Result<&mut [Option<SlotIndex>], MemoryFault> {
        self.banks
            .iter_mut()
            .find(|b| b.bank == bank)
            .map(|b| b.positions.as_mut_slice())
            .ok_or(MemoryFault::UnknownBank(bank))
    }

    pub fn get(&self, bank: BankId, position: usize) -> Option<SlotIndex> {
        self.order(bank)?.get(position).copied().flatten()
    }

    /// Returns false when the position is outside `[0, max_size)`.
    pub fn set(&mut self, bank: BankId, position: usize, slot: SlotIndex) -> bool {
        match self.order_mut(bank) {
            Ok(order) => match order.get_mut(position) {
                Some(cell) => {
                    *cell = Some(slot);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Slots at positions `[0, size)`, oldest first.
    pub fn slots(&self, bank: BankId, size: usize) -> Vec<SlotIndex> {
        self.order(bank)
            .map(|order| order.iter().take(size).flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Insert `slot` among the first `size` positions, keeping ascending
    /// timestamps. Equal timestamps keep insertion order.
    pub fn sort_insert(
        &mut self,
        bank: BankId,
        size: usize,
        slot: SlotIndex,
        store: &EntryStore,
    ) -> Result<(), MemoryFault> {
        let timestamp = store.timestamp(slot);
        let order = self.order_mut(bank)?;
        if size >= order.len() {
            return Err(MemoryFault::ChronologyFull {
                bank,
                max: order.len(),
            });
        }
        let mut position = size;
        while position > 0 {
            let older = order[position - 1];
            if older.map(|s| store.timestamp(s)).unwrap_or(0) <= timestamp {
                break;
            }
            order[position] = older;
            position -= 1;
        }
        order[position] = Some(slot);
        Ok(())
    }

    /// Move `slot` to the newest position, shifting the younger entries down.
    pub fn touch(&mut self, bank: BankId, size: usize, slot: SlotIndex) -> Result<(), MemoryFault> {
        let order = self.order_mut(bank)?;
        let size = size.min(order.len());
        let position = find_backward(order, size, slot)
            .ok_or(MemoryFault::ChronologyMiss { bank, slot })?;
        order[position..size].rotate_left(1);
        Ok(())
    }

    /// Drop `slot`, compacting the younger entries and freeing the last position.
    pub fn remove(
        &mut self,
        bank: BankId,
        size: usize,
        slot: SlotIndex,
    ) -> Result<(), MemoryFault> {
        let order = self.order_mut(bank)?;
        let size = size.min(order.len());
        let position = find_backward(order, size, slot)
            .ok_or(MemoryFault::ChronologyMiss { bank, slot })?;
        order[position..size].rotate_left(1);
        order[size - 1] = None;
        Ok(())
    }

    pub fn reset(&mut self, bank: BankId) {
        if let Ok(order) = self.order_mut(bank) {
            order.iter_mut().for_each(|cell| *cell = None);
        }
    }

    pub fn reset_all(&mut self) {
        for bank in &mut self.banks {
            bank.positions.iter_mut().for_each(|cell| *cell = None);
        }
    }
}

/// Search from the newest occupied position towards the oldest.
fn find_backward(order: &[Option<SlotIndex>], size: usize, slot: SlotIndex) -> Option<usize> {
    (0..size).rev().find(|&position| order[position] == Some(slot))
}
