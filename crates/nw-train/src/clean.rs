use std::sync::OnceLock;

use regex::Regex;

static PATTERNS: OnceLock<CleanPatterns> = OnceLock::new();

struct CleanPatterns {
    bracketed: Regex,
    digits: Regex,
    punctuation: Regex,
    whitespace: Regex,
}

impl CleanPatterns {
    fn new() -> Self {
        // ASCII punctuation minus '.', each mark escaped for the class.
        let marks: String = (0u8..128)
            .map(char::from)
            .filter(|c| c.is_ascii_punctuation() && *c != '.')
            .collect();
        Self {
            bracketed: Regex::new(r"\[[^\n]*?\]").expect("bracket regex must compile"),
            digits: Regex::new(r"\d+").expect("digit regex must compile"),
            punctuation: Regex::new(&format!("[{}]", regex::escape(&marks)))
                .expect("punctuation regex must compile"),
            whitespace: Regex::new(r"\s+").expect("whitespace regex must compile"),
        }
    }
}

/// Normalise raw corpus text for vocabulary fitting.
///
/// Lower-cases, drops `[...]` spans (within a line), decimal digit runs and
/// every ASCII punctuation mark except `.`, then collapses whitespace runs to
/// a single space and trims.
pub fn clean_text(text: &str) -> String {
    let p = PATTERNS.get_or_init(CleanPatterns::new);
    let text = text.to_lowercase();
    let text = p.bracketed.replace_all(&text, "");
    let text = p.digits.replace_all(&text, "");
    let text = p.punctuation.replace_all(&text, "");
    p.whitespace.replace_all(&text, " ").trim().to_string()
}
