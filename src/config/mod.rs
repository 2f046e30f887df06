//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config.<yaml|yml|json|toml>
//!     → MEMOS_* environment
//!     → command-line flags
//!     → loader.rs (merge & deserialize into Settings)
//!     → schema.rs (Profile, mode coerced, version derived)
//!     → validation.rs (defaults, port, DSN, data directory)
//!     → Profile (validated, immutable)
//!     → shared via Arc with driver, store and server
//! ```
//!
//! # Design Decisions
//! - Profile is immutable once validated; there is no reload
//! - All keys default to empty values so minimal configs work
//! - Validation coerces rather than rejects

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, Loader, Overrides};
pub use schema::{Mode, Profile, Settings};
pub use validation::{DataDirCheck, ProfileError};
