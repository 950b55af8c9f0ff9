//! Plain-text helpers for editor HTML.

/// Markup emitted by the editor that carries no text of its own.
const STRIPPED_TAGS: [&str; 4] = ["<p>", "</p>", "<br>", "<br/>"];

/// Strip the editor's paragraph markup and decode `&nbsp;`.
pub fn plain_text(content: &str) -> String {
    let mut text = content.to_string();
    for tag in STRIPPED_TAGS {
        text = text.replace(tag, "");
    }
    text.replace("&nbsp;", " ")
}

/// Words as the editor counts them: characters of the trimmed plain text.
///
/// CJK prose has no word separators, so every character counts once.
pub fn count_words(content: &str) -> i64 {
    plain_text(content).trim().chars().count() as i64
}
