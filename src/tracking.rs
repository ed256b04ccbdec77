//! Sequential identifier issuance.
//!
//! There is no association step: every untracked entity in every frame gets a
//! fresh identifier, and identifiers are never reused until `reset`.

use crate::Strawberry;

const FIRST_ID: u64 = 1;

#[derive(Clone, Debug)]
pub struct TrackingService {
    next_id: u64,
    tracked_count: u64,
}

impl TrackingService {
    pub fn new() -> Self {
        Self {
            next_id: FIRST_ID,
            tracked_count: 0,
        }
    }

    /// Give every entity without an identifier the next one in sequence.
    /// Entities that already carry an identifier are left untouched.
    pub fn assign_ids(&mut self, strawberries: &mut [Strawberry]) {
        for strawberry in strawberries.iter_mut() {
            if strawberry.assign_id(self.next_id) {
                self.next_id += 1;
                self.tracked_count += 1;
            }
        }
    }

    pub fn reset(&mut self) {
        self.next_id = FIRST_ID;
        self.tracked_count = 0;
    }

    /// Identifiers issued since construction or the last reset.
    pub fn total_tracked(&self) -> u64 {
        self.tracked_count
    }

    /// Identifier the next untracked entity will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}

impl Default for TrackingService {
    fn default() -> Self {
        Self::new()
    }
}
