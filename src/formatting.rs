//! Readability reformatting for model answers. Pure and idempotent.

use std::sync::OnceLock;

use regex::Regex;

fn lone_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^([ \t]*)(\d{1,2}[.)]|[-*•·▪]|[①-⑳])[ \t]*\n+[ \t]*(\S)").unwrap()
    })
}

fn blank_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

fn bullet() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^([ \t]*)[-*•·▪◦][ \t]+").unwrap())
}

/// Normalize line endings, break paragraphs after sentences, glue lone list
/// markers to their item, collapse blank runs and unify bullets to `•`.
pub fn reformat(text: &str) -> String {
    let normalized = normalize_lines(text);
    let broken = break_sentences(&normalized);
    let merged = lone_marker().replace_all(&broken, "$1$2 $3");
    let collapsed = blank_runs().replace_all(&merged, "\n\n");
    let bulleted = bullet().replace_all(&collapsed, "$1• ");
    bulleted.trim().to_string()
}

fn normalize_lines(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Start a new paragraph after `.`, `!` or `?` when the next sentence follows
/// on the same line. Numbered markers such as `1.` are left alone.
fn break_sentences(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;

        if !matches!(c, '.' | '!' | '?') || i < 2 {
            continue;
        }
        let prev = chars[i - 2];
        if prev.is_ascii_digit() || prev.is_whitespace() {
            continue;
        }
        let mut j = i;
        while j < chars.len() && matches!(chars[j], ' ' | '\t') {
            j += 1;
        }
        if j > i && j < chars.len() && !chars[j].is_whitespace() {
            out.push_str("\n\n");
            i = j;
        }
    }
    out
}
