//! Terminal color helpers for the `check` and `status` tables.
//!
//! Colors are suppressed when stdout is not a TTY or `NO_COLOR` is set
//! (https://no-color.org/).

use std::io::IsTerminal;
use std::sync::OnceLock;

static ENABLED: OnceLock<bool> = OnceLock::new();

pub fn enabled() -> bool {
    *ENABLED.get_or_init(|| {
        std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
    })
}

fn wrap(code: &str, s: &str) -> String {
    if enabled() {
        format!("\x1b[{}m{}\x1b[0m", code, s)
    } else {
        s.to_string()
    }
}

pub fn bold(s: &str) -> String       { wrap("1",    s) }
pub fn dim(s: &str) -> String        { wrap("2",    s) }
pub fn green(s: &str) -> String      { wrap("32",   s) }
pub fn yellow(s: &str) -> String     { wrap("33",   s) }
pub fn red(s: &str) -> String        { wrap("31",   s) }
pub fn bold_cyan(s: &str) -> String  { wrap("1;36", s) }
pub fn bold_green(s: &str) -> String { wrap("1;32", s) }

/// Color a systemd `ActiveState` value: active green, transitional yellow, rest red.
pub fn unit_state(state: &str) -> String {
    match state {
        "active" => green(state),
        "activating" | "reloading" | "deactivating" => yellow(state),
        _ => red(state),
    }
}

/// Visible width, ignoring ANSI escape sequences.
pub fn visible_len(s: &str) -> usize {
    let mut len = 0usize;
    let mut in_esc = false;
    for c in s.chars() {
        match c {
            '\x1b' => in_esc = true,
            'm' if in_esc => in_esc = false,
            _ if in_esc => {}
            _ => len += 1,
        }
    }
    len
}

/// Left-align `s` in a column of `width` visible characters.
pub fn rpad(s: &str, width: usize) -> String {
    let vlen = visible_len(s);
    if vlen >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - vlen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_ignores_escape_codes() {
        let colored = "\x1b[32mok\x1b[0m";
        assert_eq!(visible_len(colored), 2);
        assert_eq!(visible_len(&rpad(colored, 9)), 9);
        assert_eq!(rpad("already-wide", 4), "already-wide");
    }
}
