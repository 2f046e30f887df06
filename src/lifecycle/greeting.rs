//! Startup greeting printed on standard output.

use std::fmt::Write as _;
use std::io::Write as _;

use crate::config::Profile;

pub const WEBSITE: &str = "https://usememos.com";
pub const GITHUB: &str = "https://github.com/usememos/memos";

const BANNER: &str = r"
███╗   ███╗███████╗███╗   ███╗ ██████╗ ███████╗
████╗ ████║██╔════╝████╗ ████║██╔═══██╗██╔════╝
██╔████╔██║█████╗  ██╔████╔██║██║   ██║███████╗
██║╚██╔╝██║██╔══╝  ██║╚██╔╝██║██║   ██║╚════██║
██║ ╚═╝ ██║███████╗██║ ╚═╝ ██║╚██████╔╝███████║
╚═╝     ╚═╝╚══════╝╚═╝     ╚═╝ ╚═════╝ ╚══════╝
";

/// Render the greeting for a validated profile.
pub fn render(profile: &Profile) -> String {
    let mut out = String::new();

    if profile.is_dev() {
        let _ = writeln!(out, "Development mode is enabled");
        let _ = writeln!(out, "DSN: {}", profile.dsn);
    }

    let _ = write!(
        out,
        "---\nServer profile\nversion: {}\ndata: {}\naddr: {}\nport: {}\nmode: {}\ndriver: {}\n---\n",
        profile.version,
        profile.data.display(),
        profile.addr,
        profile.port,
        profile.mode,
        profile.driver,
    );

    out.push_str(BANNER);

    if profile.addr.is_empty() {
        let _ = writeln!(
            out,
            "Version {} has been started on port {}",
            profile.version, profile.port
        );
    } else {
        let _ = writeln!(
            out,
            "Version {} has been started on address '{}' and port {}",
            profile.version, profile.addr, profile.port
        );
    }

    let _ = write!(
        out,
        "---\nSee more in:\n👉Website: {WEBSITE}\n👉GitHub: {GITHUB}\n---\n"
    );
    out
}

/// Print the greeting to standard output.
pub fn print(profile: &Profile) {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout
        .write_all(render(profile).as_bytes())
        .and_then(|()| stdout.flush())
    {
        tracing::warn!(error = %e, "Failed to print greeting");
    }
}
