use regex::Regex;
use std::sync::LazyLock;

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new("[^a-z0-9]+").unwrap());

/// Lowercases `s` and collapses every run of other characters into one `_`,
/// so the result is safe inside MQTT topics and Home Assistant ids.
pub fn make_slug(s: &str) -> String {
    let lower = s.to_ascii_lowercase();
    NON_ALNUM.replace_all(&lower, "_").trim_matches('_').to_owned()
}
