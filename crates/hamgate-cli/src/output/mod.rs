//! Output formatting utilities for the CLI
//!
//! Tables for enrolled callsigns and coloured status lines.

use tabled::{settings::Style, Table, Tabled};

/// One enrolled callsign as shown by `hamgate users`
#[derive(Debug, Clone)]
pub struct UserEntry {
    pub callsign: String,
    pub secret: String,
    pub valid: bool,
}

/// Format enrolled callsigns as a table
///
/// Secrets are masked to their first four characters.
pub fn format_users(users: &[UserEntry]) -> String {
    if users.is_empty() {
        return "No callsigns enrolled".to_string();
    }

    #[derive(Tabled)]
    struct UserRow {
        #[tabled(rename = "CALLSIGN")]
        callsign: String,
        #[tabled(rename = "SECRET")]
        secret: String,
        #[tabled(rename = "BITS")]
        bits: usize,
        #[tabled(rename = "STATUS")]
        status: &'static str,
    }

    let rows: Vec<UserRow> = users
        .iter()
        .map(|u| UserRow {
            callsign: u.callsign.clone(),
            secret: mask(&u.secret),
            bits: u.secret.chars().count() * 5,
            status: if u.valid { "ok" } else { "invalid secret" },
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

fn mask(secret: &str) -> String {
    let head: String = secret.chars().take(4).collect();
    format!("{}…", head)
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
