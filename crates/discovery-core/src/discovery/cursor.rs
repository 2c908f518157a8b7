//! Position within the day's queue.

use crate::profile::{DailyQueue, Profile, ProfileId};

/// Holds the fixed daily queue and the index of the profile on screen.
///
/// `index` ranges over `0..=len`; `index == len` is the exhausted state.
#[derive(Debug, Clone, Default)]
pub struct QueueCursor {
    queue: DailyQueue,
    index: usize,
}

impl QueueCursor {
    pub fn new(queue: DailyQueue) -> Self {
        Self { queue, index: 0 }
    }

    pub fn current(&self) -> Option<&Profile> {
        self.queue.get(self.index)
    }

    /// Move to the next profile. A no-op once exhausted.
    pub fn advance(&mut self) -> Option<&Profile> {
        if self.index < self.queue.len() {
            self.index += 1;
        }
        self.current()
    }

    /// Whether `profile_id` belongs to the loaded queue, resolved or not.
    pub fn contains(&self, profile_id: &ProfileId) -> bool {
        self.queue.iter().any(|p| &p.id == profile_id)
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.queue.len()
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn remaining(&self) -> usize {
        self.queue.len() - self.index
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
