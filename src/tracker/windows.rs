//! Windowed XP accumulators.

use crate::models::ChangeRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Daily accumulator entry with task-completion bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEntry {
    pub accumulated: u64,
    pub slot1_completed: bool,
    pub slot2_completed: bool,
    pub slot1_xp: u64,
    pub slot2_xp: u64,
}

/// Which task slot a gain was made in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSlot {
    /// Day slot.
    First,
    /// Everything outside the day slot.
    Second,
}

impl DailyEntry {
    /// Mark the slot's task complete if `gain` hits the threshold exactly.
    ///
    /// Returns `true` when the flag was newly set.
    pub fn complete_task(&mut self, slot: TaskSlot, gain: u64, threshold: u64) -> bool {
        if gain != threshold {
            return false;
        }

        let (completed, xp) = match slot {
            TaskSlot::First => (&mut self.slot1_completed, &mut self.slot1_xp),
            TaskSlot::Second => (&mut self.slot2_completed, &mut self.slot2_xp),
        };

        if *completed {
            return false;
        }

        *completed = true;
        *xp = gain;
        true
    }
}

/// Daily window: entries survive resets as zeroed records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyWindow {
    entries: HashMap<String, DailyEntry>,
}

impl DailyWindow {
    /// Make sure a zero entry exists for a known gang.
    pub fn track(&mut self, name: &str) {
        if !self.entries.contains_key(name) {
            self.entries.insert(name.to_string(), DailyEntry::default());
        }
    }

    pub fn apply(&mut self, changes: &[ChangeRecord]) {
        for change in changes {
            let gain = change.gain();
            if gain == 0 {
                continue;
            }
            let entry = self.entries.entry(change.name.clone()).or_default();
            entry.accumulated = entry.accumulated.saturating_add(gain);
        }
    }

    /// Zero every entry in place.
    pub fn clear(&mut self) {
        for entry in self.entries.values_mut() {
            *entry = DailyEntry::default();
        }
    }

    pub fn get(&self, name: &str) -> Option<&DailyEntry> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DailyEntry> {
        self.entries.get_mut(name)
    }

    pub fn accumulated(&self, name: &str) -> u64 {
        self.entries.get(name).map_or(0, |e| e.accumulated)
    }

    pub fn total(&self) -> u64 {
        self.entries.values().map(|e| e.accumulated).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Weekly or monthly window: plain totals, emptied on reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalsWindow {
    entries: HashMap<String, u64>,
}

impl TotalsWindow {
    pub fn apply(&mut self, changes: &[ChangeRecord]) {
        for change in changes {
            let gain = change.gain();
            if gain == 0 {
                continue;
            }
            let total = self.entries.entry(change.name.clone()).or_insert(0);
            *total = total.saturating_add(gain);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn accumulated(&self, name: &str) -> u64 {
        self.entries.get(name).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.entries.values().sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
