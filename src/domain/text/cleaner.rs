use html2text::from_read;
use once_cell::sync::Lazy;
use regex::Regex;

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s]+").expect("url pattern is valid"));
static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[^\S\n]*\n\s*").expect("paragraph pattern is valid"));
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Convert HTML to plain text, then clean it like any other input
pub fn html_to_speech_text(html: &str) -> String {
    let plain_text = from_read(html.as_bytes(), usize::MAX);
    clean_text(&plain_text)
}

/// Remove URLs and normalize whitespace, keeping paragraph breaks.
///
/// Single line breaks inside a paragraph become spaces; paragraphs are
/// separated by exactly one blank line.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");

    PARAGRAPH_BREAK
        .split(&text)
        .map(|paragraph| {
            let without_urls = URL.replace_all(paragraph, "");
            WHITESPACE
                .replace_all(&without_urls, " ")
                .trim()
                .to_string()
        })
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
