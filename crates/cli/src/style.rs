//! Shared styling utilities for CLI output.

use console::Style;

use hunkmerge_core::Resolution;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Colored label for a hunk resolution.
pub fn resolution(resolution: &Resolution) -> String {
    let style = match resolution {
        Resolution::Unresolved => Style::new().red(),
        Resolution::Ours => Style::new().blue(),
        Resolution::Theirs => Style::new().magenta(),
        Resolution::Both => Style::new().cyan(),
        Resolution::Custom(_) => Style::new().green(),
    };
    style.apply_to(resolution.to_string()).to_string()
}
