//! Deterministic output guard for rewritten text.
//!
//! Whatever the model returns, brand tokens and marketing superlatives are
//! removed as whole words and the result is tidied and length-capped.

use regex::Regex;

/// Maximum name length in characters.
pub const MAX_NAME_CHARS: usize = 80;

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 400;

/// Upper-case tokens that describe the item rather than its maker.
const GENERIC_ACRONYMS: &[&str] = &[
    "PLA", "ABS", "PETG", "TPU", "LED", "USB", "LCD", "HDMI", "DIY", "STEM", "PVC", "RGB", "UV", "AA", "AAA", "HB",
    "XL", "XXL", "PC", "AC", "DC", "HD", "PH", "CPU", "GPS", "MDF",
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive whole-word pattern for `term`.
///
/// `\b` only anchors next to word characters, so terms like "PLA+" get
/// the boundary on the side that has one.
fn whole_word(term: &str) -> Option<Regex> {
    let term = term.trim();
    let first = term.chars().next()?;
    let last = term.chars().last()?;

    let start = if is_word_char(first) { r"\b" } else { "" };
    let end = if is_word_char(last) { r"\b" } else { "" };
    Regex::new(&format!("(?i){start}{}{end}", regex::escape(term))).ok()
}

/// Leading title token when it looks like a shouted brand ("SUNLU PLA Filament").
pub fn leading_brand_token(title: &str) -> Option<String> {
    let token = title.split_whitespace().next()?;
    let token = token.trim_matches(|c: char| !c.is_alphanumeric());

    let letters: Vec<char> = token.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < 2 || !letters.iter().all(|c| c.is_uppercase()) {
        return None;
    }

    let base = token.split(['-', '+', '/']).next().unwrap_or(token);
    if GENERIC_ACRONYMS.iter().any(|a| a.eq_ignore_ascii_case(base)) {
        return None;
    }

    Some(token.to_string())
}

/// Remove each of `terms` from `text` as a whole word, longest first.
pub fn strip_terms(text: &str, terms: &[String]) -> String {
    let mut sorted: Vec<&String> = terms.iter().filter(|t| !t.trim().is_empty()).collect();
    sorted.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));

    let mut out = text.to_string();
    for term in sorted {
        if let Some(re) = whole_word(term) {
            out = re.replace_all(&out, " ").into_owned();
        }
    }
    out
}

/// Collapse whitespace, drop punctuation left dangling by removals and
/// capitalize the first letter.
pub fn tidy(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::with_capacity(collapsed.len());
    for c in collapsed.chars() {
        if matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | ')') && out.ends_with(' ') {
            out.pop();
        }
        if c == ',' && out.ends_with(',') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '|' | '–'));
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncate to at most `max` characters on a word boundary.
pub fn cap(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let cut: String = text.chars().take(max).collect();
    let at_boundary = text.chars().nth(max).is_some_and(char::is_whitespace);
    let cut = match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 && !at_boundary => &cut[..idx],
        _ => cut.as_str(),
    };
    cut.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'))
        .to_string()
}

/// Output guard configured with the forbidden vocabulary.
#[derive(Debug, Clone)]
pub struct OutputGuard {
    blocklist: Vec<String>,
}

impl OutputGuard {
    pub fn new(blocklist: Vec<String>) -> Self {
        Self { blocklist }
    }

    /// Sanitize a name. Brand tokens and blocklisted words are removed.
    pub fn name(&self, text: &str, brands: &[String]) -> String {
        cap(&tidy(&self.strip(text, brands)), MAX_NAME_CHARS)
    }

    /// Sanitize a description.
    pub fn description(&self, text: &str, brands: &[String]) -> String {
        cap(&tidy(&self.strip(text, brands)), MAX_DESCRIPTION_CHARS)
    }

    fn strip(&self, text: &str, brands: &[String]) -> String {
        let terms: Vec<String> = brands.iter().chain(self.blocklist.iter()).cloned().collect();
        strip_terms(text, &terms)
    }
}
