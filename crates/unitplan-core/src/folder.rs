//! Drive folder reference parsing.
//!
//! Accepts a bare folder id, a `/folders/<id>` URL, or a URL carrying an
//! `id=<id>` query parameter. Patterns are tried in that order.

use std::sync::LazyLock;

use regex::Regex;

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{20,}$").expect("valid regex"));
static FOLDER_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/folders/([a-zA-Z0-9_-]+)").expect("valid regex"));
static QUERY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=([a-zA-Z0-9_-]+)").expect("valid regex"));

/// Extract a Drive folder id from user input, or `None` if nothing matches.
pub fn extract_folder_id(text: &str) -> Option<String> {
    let text = text.trim();
    if BARE_ID.is_match(text) {
        return Some(text.to_string());
    }
    [&*FOLDER_PATH, &*QUERY_ID]
        .into_iter()
        .find_map(|re| re.captures(text)?.get(1))
        .map(|m| m.as_str().to_string())
}
