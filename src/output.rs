use console::{Color, Term, style};
use std::io::{self, Write};

fn stderr_is_tty() -> bool {
    Term::stderr().is_term()
}

fn labeled(label: &str, color: Color, msg: &str) {
    let label = if stderr_is_tty() {
        style(label).bold().fg(color).to_string()
    } else {
        label.to_string()
    };
    let _ = writeln!(io::stderr(), "{label} {msg}");
}

/// `[ok] <msg>` in green.
pub fn ok(msg: &str) {
    labeled("[ok]", Color::Green, msg);
}

/// `[!!] <msg>` in yellow.
pub fn warn(msg: &str) {
    labeled("[!!]", Color::Yellow, msg);
}

/// Dim secondary detail.
pub fn note(msg: &str) {
    let line = if stderr_is_tty() {
        style(format!("  {msg}")).dim().to_string()
    } else {
        format!("  {msg}")
    };
    let _ = writeln!(io::stderr(), "{line}");
}
