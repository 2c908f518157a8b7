//! Daily discovery: decisions, the queue cursor, and the session engine
//! that ties them to the view timer and the backend.

mod cursor;
mod decision;
mod engine;
mod recorder;

pub use cursor::QueueCursor;
pub use decision::{Decision, DecisionKind, DecisionOutcome, RejectReason};
pub use engine::{
    DecisionTicket, EngineConfig, Resolution, SessionCounters, SessionEngine, SessionPhase,
    SessionView,
};
pub use recorder::DecisionRecorder;
