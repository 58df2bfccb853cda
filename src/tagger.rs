use std::collections::HashMap;

/// Label applied when no usable keyword survives filtering.
pub const FALLBACK_TAG: &str = "General";

/// At most this many labels per article.
pub const MAX_TAGS: usize = 3;

/// Tokens must be strictly longer than this many characters.
const SHORT_TOKEN_LIMIT: usize = 3;

// Filler words across the French and English feeds this was built for
const STOP_WORDS: &[&str] = &[
    // French
    "le", "la", "les", "de", "des", "du", "un", "une", "et", "à", "en", "pour", "que", "qui",
    "dans", "sur", "par", "plus", "pas", "au", "ce", "cette", "avec", "sont", "est", "il",
    "elle", "nous", "vous", "ils", "elles", "mais", "ou", "donc", "car", "ni", "or", "a",
    "son", "sa", "ses", "après", "avant", "depuis", "selon", "sans", "sous", "vers", "chez",
    "très", "bien", "encore",
    // English
    "the", "an", "and", "to", "for", "of", "with", "is", "are", "in", "on",
];

/// Derives up to three topic labels for an article from its title and
/// description. Title terms count double. The same input always yields
/// the same labels, in the same order.
pub fn tag(title: &str, description: &str) -> Vec<String> {
    let weighted = format!("{title} {title} {description}");
    let cleaned = normalize(&weighted);
    let tokens: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() > SHORT_TOKEN_LIMIT && !STOP_WORDS.contains(token))
        .collect();

    let ranked = rank_by_count(tokens);
    if ranked.is_empty() {
        return vec![FALLBACK_TAG.to_string()];
    }

    ranked
        .into_iter()
        .take(MAX_TAGS)
        .map(|(token, _)| capitalize(&token))
        .collect()
}

/// Counts tokens and ranks them by descending frequency. Ties keep the
/// order in which a token first appeared, so the ranking is a pure
/// function of the input sequence. Shared with the digest aggregator.
pub(crate) fn rank_by_count<'a, I>(tokens: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for token in tokens {
        match counts.get_mut(token) {
            Some(count) => *count += 1,
            None => {
                counts.insert(token, 1);
                order.push(token);
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|token| (token.to_string(), counts[token]))
        .collect();
    // Stable sort keeps first-occurrence order among equal counts
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Removes markup spans, folds punctuation into spaces and lowercases.
/// Word characters (alphanumeric and underscore) and whitespace pass
/// through untouched.
fn normalize(text: &str) -> String {
    strip_markup(text)
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .to_lowercase()
}

// Simple bracket scanning without regex. A span is dropped only when a
// closing '>' follows with at least one character in between; empty "<>"
// and unterminated '<' are kept literally.
fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        let (before, tail) = rest.split_at(open);
        out.push_str(before);
        match tail[1..].find('>') {
            Some(close) if close > 0 => {
                rest = &tail[close + 2..];
            }
            _ => {
                out.push('<');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => {
            let mut out: String = first.to_uppercase().collect();
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}
