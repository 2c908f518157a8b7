//! Unlock policy for the interest action.
//!
//! Pass is never gated. Interest unlocks either when the view timer has
//! completed or when the day's free pick is still available.

use serde::Serialize;

/// Whether expressing interest is currently permitted.
pub fn is_interest_allowed(free_pick_available: bool, timer_complete: bool) -> bool {
    free_pick_available || timer_complete
}

/// Whether an interest issued now would spend the free pick.
///
/// The free pick is only spent when the decision would otherwise have been
/// blocked; once the timer has completed on its own the pick is kept.
pub fn would_consume_free_pick(free_pick_available: bool, timer_complete: bool) -> bool {
    free_pick_available && !timer_complete
}

/// Evaluated lock state for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnlockState {
    pub locked: bool,
    pub is_free_pick: bool,
}

impl UnlockState {
    pub fn evaluate(free_pick_available: bool, timer_complete: bool) -> Self {
        Self {
            locked: !is_interest_allowed(free_pick_available, timer_complete),
            is_free_pick: would_consume_free_pick(free_pick_available, timer_complete),
        }
    }
}
