// src/core/sanitize.rs

//! Strips ECMA-48 CSI terminal escapes from console output lines.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Matches one Control Sequence Introducer: ESC, `[`, parameter bytes
/// (digits and semicolons), and a single final letter.
static CSI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B\[[0-9;]*[A-Za-z]").expect("CSI pattern is valid"));

/// Removes every CSI escape sequence from `line`.
///
/// A single replacement pass is not enough: removing a sequence can splice
/// the surrounding bytes into a new one (e.g. `ESC ESC [0m [0m`), so the
/// pass repeats until the output stops changing. This makes `clean`
/// idempotent for every input, not just well-formed terminal output.
pub fn clean(line: &str) -> String {
    let mut current = Cow::Borrowed(line);
    loop {
        match CSI.replace_all(&current, "") {
            Cow::Borrowed(_) => return current.into_owned(),
            Cow::Owned(next) => current = Cow::Owned(next),
        }
    }
}
