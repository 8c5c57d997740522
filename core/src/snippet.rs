use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

lazy_static! {
    static ref TAG: Regex = Regex::new(r"<[^>]*>").expect("valid regex");
    static ref LINK: Regex = Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("valid regex");
    static ref EMPHASIS: Regex = Regex::new(r"[*_`~#>]+").expect("valid regex");
    static ref SPACE: Regex = Regex::new(r"\s+").expect("valid regex");
}

/// Strip HTML tags and markdown decoration, collapse whitespace and cut to
/// `max_chars` characters.
pub fn clean_excerpt(raw: &str, max_chars: usize) -> String {
    let s = TAG.replace_all(raw, " ");
    let s = LINK.replace_all(&s, "$1");
    let s = EMPHASIS.replace_all(&s, "");
    let s = SPACE.replace_all(&s, " ");
    truncate_chars(s.trim(), max_chars)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", s[..cut].trim_end()),
        None => s.to_string(),
    }
}

fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let pat = RegexBuilder::new(&regex::escape(needle)).case_insensitive(true).build().ok()?;
    pat.find(haystack).map(|m| m.start())
}

/// A window of roughly `width` chars around the first occurrence of any raw
/// query word, or the head of the text when nothing matches.
pub fn snippet(text: &str, raw_terms: &[String], width: usize) -> String {
    if text.is_empty() { return String::new(); }
    let first_idx = raw_terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .find_map(|t| find_case_insensitive(text, t));
    match first_idx {
        Some(idx) => {
            let before = width / 3;
            let start_char = text[..idx].chars().count().saturating_sub(before);
            let window: String = text.chars().skip(start_char).take(width).collect();
            let mut out = String::new();
            if start_char > 0 { out.push('…'); }
            out.push_str(&window);
            if start_char + width < text.chars().count() { out.push('…'); }
            out
        }
        None => truncate_chars(text, width),
    }
}

/// Wrap case-insensitive occurrences of each term in `<em>`.
pub fn highlight(snippet: &str, terms: &[String]) -> String {
    let words: Vec<String> = terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).map(regex::escape).collect();
    if words.is_empty() { return snippet.to_string(); }
    let pat = match RegexBuilder::new(&words.join("|")).case_insensitive(true).build() {
        Ok(p) => p,
        Err(_) => return snippet.to_string(),
    };
    pat.replace_all(snippet, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_is_cleaned_and_cut() {
        let e = clean_excerpt("<p>Some **bold** and [a link](http://x)</p>\n\n  more", 200);
        assert_eq!(e, "Some bold and a link more");
        assert_eq!(clean_excerpt("abcdef", 3), "abc…");
    }

    #[test]
    fn snippet_is_char_boundary_safe() {
        let text = "it’s — café ".repeat(40) + "needle here";
        let s = snippet(&text, &["NEEDLE".to_string()], 30);
        assert!(s.contains("needle"));
        assert!(s.starts_with('…'));
    }

    #[test]
    fn highlight_wraps_terms() {
        let h = highlight("Rust and rust", &["rust".to_string()]);
        assert_eq!(h, "<em>Rust</em> and <em>rust</em>");
    }
}
