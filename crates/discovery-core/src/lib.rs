//! # Daily Discovery Core Library
//!
//! This library provides the core logic for Daily Discovery, a once-a-day
//! profile browsing session. Users see a fixed queue of candidates one at a
//! time and can only express interest after a profile has been on screen for
//! a minimum dwell time, unless they spend their single daily free pick.
//!
//! ## Architecture
//!
//! - **View timer**: A wall-clock countdown per profile that requires the
//!   caller to periodically invoke `tick()`
//! - **Unlock policy**: Pure rule deciding whether interest is allowed and
//!   whether it spends the free pick
//! - **Session engine**: Event-driven state machine over today's queue
//! - **Backend**: The server contract, an HTTP client and an in-memory
//!   reference server that enforces dwell time on its own clock
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`SessionEngine`]: Orchestrates one user's day
//! - [`ViewTimer`]: Per-profile countdown
//! - [`DiscoveryBackend`]: Authority contract
//! - [`Config`]: Application configuration management

pub mod backend;
pub mod clock;
pub mod discovery;
pub mod error;
pub mod events;
pub mod profile;
pub mod storage;
pub mod timer;

pub use backend::{AuthFlag, AuthGate, DiscoveryBackend, HttpBackend, InMemoryBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use discovery::{
    Decision, DecisionKind, DecisionOutcome, EngineConfig, RejectReason, Resolution,
    SessionEngine, SessionPhase, SessionView,
};
pub use error::{BackendError, ConfigError, CoreError, Result, SessionFailure, ValidationError};
pub use events::Event;
pub use profile::{DailyQueue, Profile, ProfileId};
pub use storage::Config;
pub use timer::{UnlockState, ViewTimer};
