//! Server-side enforcement of the restricted HTML subset used for notices.

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Tags that survive sanitizing. Everything else is unwrapped.
pub const ALLOWED_TAGS: [&str; 10] = ["h1", "h2", "h3", "p", "ul", "ol", "li", "strong", "em", "br"];

struct Patterns {
    fence: Regex,
    comment: Regex,
    script: Regex,
    style: Regex,
    head: Regex,
    doctype: Regex,
    tag: Regex,
    leading_heading: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        fence: Regex::new(r"```[A-Za-z]*").unwrap(),
        comment: Regex::new(r"(?s)<!--.*?-->").unwrap(),
        script: Regex::new(r"(?is)<script\b.*?</script\s*>").unwrap(),
        style: Regex::new(r"(?is)<style\b.*?</style\s*>").unwrap(),
        head: Regex::new(r"(?is)<head\b.*?</head\s*>").unwrap(),
        doctype: Regex::new(r"(?i)<!doctype[^>]*>").unwrap(),
        tag: Regex::new(r"(?s)<\s*(/?)\s*([A-Za-z][A-Za-z0-9]*)\b[^>]*>").unwrap(),
        leading_heading: Regex::new(r"(?i)^<h[123]>").unwrap(),
    })
}

/// Reduce model output to the allowed tag set without attributes and make
/// sure the document opens with a heading, using `fallback_title` if not.
pub fn sanitize_html(raw: &str, fallback_title: &str) -> String {
    let p = patterns();
    let text = p.fence.replace_all(raw, "");
    let text = p.comment.replace_all(&text, "");
    let text = p.script.replace_all(&text, "");
    let text = p.style.replace_all(&text, "");
    let text = p.head.replace_all(&text, "");
    let text = p.doctype.replace_all(&text, "");
    let text = p.tag.replace_all(&text, |caps: &Captures| {
        let name = caps[2].to_ascii_lowercase();
        if !ALLOWED_TAGS.contains(&name.as_str()) {
            return String::new();
        }
        match (&caps[1], name.as_str()) {
            (_, "br") => "<br>".to_string(),
            ("/", _) => format!("</{name}>"),
            _ => format!("<{name}>"),
        }
    });
    let body = text.trim();

    if p.leading_heading.is_match(body) {
        body.to_string()
    } else if body.is_empty() {
        format!("<h2>{fallback_title}</h2>")
    } else {
        format!("<h2>{fallback_title}</h2>\n{body}")
    }
}
