//! Threshold gate: tracks which parties have been selected for an unlock
//!
//! The gate only counts. For replicated shares reaching the threshold proves
//! nothing about the selected identities; for Shamir shares the session
//! follows an unlock with a real reconstruction from exactly these ids.

use rektsafe_core::{RektsafeError, RektsafeResult};
use std::collections::BTreeSet;

use crate::threshold::ThresholdConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    SharesSelected,
    Unlocked,
}

#[derive(Debug, Clone)]
pub struct ThresholdGate {
    config: ThresholdConfig,
    selected: BTreeSet<u8>,
}

impl ThresholdGate {
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            config,
            selected: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> ThresholdConfig {
        self.config
    }

    pub fn select(&mut self, id: u8) -> RektsafeResult<GateState> {
        if !self.config.contains_party(id) {
            return Err(RektsafeError::Configuration(format!(
                "party {id} outside 1..={}",
                self.config.total_parties()
            )));
        }
        self.selected.insert(id);
        Ok(self.state())
    }

    pub fn deselect(&mut self, id: u8) -> GateState {
        self.selected.remove(&id);
        self.state()
    }

    /// Flip selection of `id`, as a checkbox would.
    pub fn toggle(&mut self, id: u8) -> RektsafeResult<GateState> {
        if self.selected.contains(&id) {
            Ok(self.deselect(id))
        } else {
            self.select(id)
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn can_proceed(&self) -> bool {
        self.selected.len() >= self.config.threshold() as usize
    }

    pub fn state(&self) -> GateState {
        if self.selected.is_empty() {
            GateState::Idle
        } else if self.can_proceed() {
            GateState::Unlocked
        } else {
            GateState::SharesSelected
        }
    }

    /// Selected ids in ascending order.
    pub fn selected(&self) -> Vec<u8> {
        self.selected.iter().copied().collect()
    }
}
