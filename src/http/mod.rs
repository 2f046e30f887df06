//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (bind, Axum setup, graceful shutdown)
//!     → request.rs (assign and propagate request ID)
//!     → trace and timeout layers
//!     → handlers (health, workspace profile) → Store
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{Server, ServerError, SHUTDOWN_GRACE_PERIOD};
