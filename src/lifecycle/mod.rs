//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated profile → Driver → Store.migrate → Server → Start
//!
//! Shutdown (shutdown.rs):
//!     Request received → Server.shutdown (drain) → Cancel root scope → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown request
//! ```
//!
//! # Design Decisions
//! - Ordered startup: storage first, then migrations, then the listener
//! - Ordered shutdown: stop accept, drain, cancel, close store
//! - Shutdown runs at most once, whatever the signal sequence

pub mod greeting;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use signals::ShutdownSignal;
pub use startup::{Components, Lifecycle, Outcome, Phase, Service, Services, State, Storage};
