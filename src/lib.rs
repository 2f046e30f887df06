//! memos server bootstrap and lifecycle controller.

// Configuration and storage
pub mod config;
pub mod store;

// Network surface
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod version;

pub use config::{Loader, Mode, Profile};
pub use http::Server;
pub use lifecycle::{Lifecycle, Outcome, ShutdownSignal};
pub use store::Store;
