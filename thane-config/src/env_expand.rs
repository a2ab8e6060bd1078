//! `${VAR}` environment-variable expansion applied to the raw config text
//! before YAML parsing.

use std::sync::OnceLock;

use regex::Regex;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap())
}

/// Replaces every `${VAR}` occurrence with the process environment value for
/// `VAR`, or the empty string if unset. Unmatched syntax (bare `$VAR`, stray
/// `$`) passes through untouched.
pub fn expand(raw: &str) -> String {
    pattern()
        .replace_all(raw, |caps: &regex::Captures| {
            let name = &caps[1];
            std::env::var(name).unwrap_or_default()
        })
        .into_owned()
}
