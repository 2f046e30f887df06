//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (error, driver, address, ...)
//!
//! Consumers:
//!     → logging.rs (stderr, JSON in prod, human readable otherwise)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing in production
//! - Log level overridable through `RUST_LOG`

pub mod logging;
