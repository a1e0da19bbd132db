//! `$(name)` variable substitution for task inputs.
//!
//! Pure functions, no I/O. Unknown tokens stay verbatim and substituted
//! values are not scanned again (single pass).

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::request::{TaskInstance, Variables};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(([^()]+)\)").expect("token pattern is valid"));

/// Look a variable up: exact name first, then ASCII case-insensitive.
pub fn lookup<'a>(vars: &'a Variables, name: &str) -> Option<&'a str> {
    vars.get(name)
        .or_else(|| {
            vars.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

/// Replace every known `$(name)` token in `value`.
pub fn substitute<'a>(value: &'a str, vars: &Variables) -> Cow<'a, str> {
    if vars.is_empty() || !value.contains("$(") {
        return Cow::Borrowed(value);
    }
    TOKEN.replace_all(value, |caps: &Captures<'_>| match lookup(vars, caps[1].trim()) {
        Some(v) => v.to_string(),
        None => caps[0].to_string(),
    })
}

/// Substitute every input of every task in place.
pub fn substitute_inputs(tasks: &mut [TaskInstance], vars: &Variables) {
    for task in tasks {
        for value in task.inputs.values_mut() {
            if let Cow::Owned(replaced) = substitute(value, vars) {
                *value = replaced;
            }
        }
    }
}
