//! Markup stripping for chat text.
//!
//! This is a blunt filter, not an HTML sanitizer: `<script>` blocks are
//! removed together with their content, then every remaining angle bracket
//! is dropped.

use regex::Regex;
use std::sync::LazyLock;

/// `<script ...>...</script>`, case-insensitive, spanning lines, non-greedy.
#[allow(clippy::expect_used)] // Pattern is a compile-time constant.
static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script block pattern is valid")
});

/// Strip script blocks and angle brackets, then trim.
///
/// The trim goes past markup stripping: surrounding whitespace is removed
/// too, so text made only of markup and spaces comes out empty and
/// [`super::ChatChannel::compose`] rejects it.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(raw, "");
    without_scripts
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .collect::<String>()
        .trim()
        .to_string()
}
