//! Server version strings.

/// Version reported by production builds.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version reported in `dev` and `demo` mode.
pub const DEV_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-dev");

/// Version string for the mode as configured.
///
/// Takes the raw value: a mode that is later coerced to `demo` still reports
/// the release version.
pub fn current_version(mode: &str) -> &'static str {
    match mode {
        "dev" | "demo" => DEV_VERSION,
        _ => VERSION,
    }
}
