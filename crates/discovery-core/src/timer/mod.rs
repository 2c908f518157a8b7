mod unlock;
mod view_timer;

pub use unlock::{is_interest_allowed, would_consume_free_pick, UnlockState};
pub use view_timer::{TimerState, ViewSession, ViewTimer, DEFAULT_VIEW_DURATION_SECS};
