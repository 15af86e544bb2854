use std::ops::Range;

use dem_types::{BankId, MemoryConfig, SlotIndex};

use crate::error::MemoryFault;

/// First value handed out by the global timestamp; 0 marks never-stamped entries.
pub const INITIAL_TIMESTAMP: u32 = 1;

#[derive(Clone, Debug)]
struct BankState {
    id: BankId,
    first: usize,
    end: usize,
    current_size: usize,
    overflow: bool,
}

impl BankState {
    fn max_size(&self) -> usize {
        self.end - self.first
    }
}

/// Runtime counters for every bank plus the global timestamp source.
#[derive(Clone, Debug)]
pub struct BankDirectory {
    banks: Vec<BankState>,
    timestamp: u32,
}

impl BankDirectory {
    /// Lay out the banks back to back in configuration order.
    pub fn new(config: &MemoryConfig) -> Self {
        let mut first = 0usize;
        let banks = config
            .banks
            .iter()
            .map(|bank| {
                let end = first + bank.capacity as usize;
                let state = BankState {
                    id: bank.id,
                    first,
                    end,
                    current_size: 0,
                    overflow: false,
                };
                first = end;
                state
            })
            .collect();
        Self {
            banks,
            timestamp: INITIAL_TIMESTAMP,
        }
    }

    fn state(&self, bank: BankId) -> Option<&BankState> {
        self.banks.iter().find(|b| b.id == bank)
    }

    fn state_mut(&mut self, bank: BankId) -> Option<&mut BankState> {
        self.banks.iter_mut().find(|b| b.id == bank)
    }

    pub fn bank_ids(&self) -> impl Iterator<Item = BankId> + '_ {
        self.banks.iter().map(|b| b.id)
    }

    pub fn contains(&self, bank: BankId) -> bool {
        self.state(bank).is_some()
    }

    /// Store indices `[first, end)` owned by the bank.
    pub fn range(&self, bank: BankId) -> Option<Range<usize>> {
        self.state(bank).map(|b| b.first..b.end)
    }

    pub fn bank_of_slot(&self, slot: SlotIndex) -> Option<BankId> {
        self.banks
            .iter()
            .find(|b| (b.first..b.end).contains(&slot.get()))
            .map(|b| b.id)
    }

    pub fn total_slots(&self) -> usize {
        self.banks.last().map(|b| b.end).unwrap_or(0)
    }

    /// Capacity of the bank; 0 for unknown banks.
    pub fn max_size(&self, bank: BankId) -> usize {
        self.state(bank).map(BankState::max_size).unwrap_or(0)
    }

    pub fn current_size(&self, bank: BankId) -> usize {
        self.state(bank).map(|b| b.current_size).unwrap_or(0)
    }

    /// Set the occupied-slot count, saturating at the bank's capacity.
    ///
    /// An out-of-range request is still applied (clamped) and returned as a
    /// fault for the caller to report.
    pub fn set_current_size(&mut self, bank: BankId, size: usize) -> Result<(), MemoryFault> {
        let state = self.state_mut(bank).ok_or(MemoryFault::UnknownBank(bank))?;
        let max = state.max_size();
        state.current_size = size.min(max);
        if size > max {
            return Err(MemoryFault::SizeOutOfRange {
                bank,
                requested: size,
                max,
            });
        }
        Ok(())
    }

    pub fn overflow(&self, bank: BankId) -> bool {
        self.state(bank).is_some_and(|b| b.overflow)
    }

    pub fn set_overflow(&mut self, bank: BankId) {
        if let Some(state) = self.state_mut(bank) {
            state.overflow = true;
        }
    }

    pub fn reset_overflow(&mut self, bank: BankId) {
        if let Some(state) = self.state_mut(bank) {
            state.overflow = false;
        }
    }

    /// The value the next allocation or touch will be stamped with.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u32) {
        self.timestamp = timestamp;
    }

    /// Hand out the current timestamp and move the counter forward.
    pub fn advance_timestamp(&mut self) -> u32 {
        let stamped = self.timestamp;
        self.timestamp = self.timestamp.saturating_add(1);
        stamped
    }

    /// Cold-start state: every bank empty, no overflow, timestamp rewound.
    pub fn reset(&mut self) {
        for bank in &mut self.banks {
            bank.current_size = 0;
            bank.overflow = false;
        }
        self.timestamp = INITIAL_TIMESTAMP;
    }
}
