//! Merchant text normalisation.
//!
//! Every raw merchant or description string has two derived forms: a
//! *key* used for equality comparisons (learned rules, duplicate detection,
//! category text) and a *display name* shown to the reviewer.

/// Store numbers such as `#123`, `*0042` or a bare `10458`.
fn is_store_number(token: &str) -> bool {
    let digits = token.trim_start_matches(['#', '*']);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    digits.len() != token.len() || digits.len() >= 3
}

fn clean_token(token: &str) -> String {
    token
        .chars()
        .filter_map(|c| match c {
            '\'' | '\u{2019}' => None,
            c if c.is_alphanumeric() || c == '&' => Some(c),
            _ => Some(' '),
        })
        .collect()
}

fn join_clean<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
    tokens
        .map(clean_token)
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased, punctuation-stripped comparison key. Store numbers are
/// dropped unless nothing else remains. Empty input gives an empty key.
pub fn normalize_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let key = join_clean(lowered.split_whitespace().filter(|t| !is_store_number(t)));
    if key.is_empty() {
        join_clean(lowered.split_whitespace())
    } else {
        key
    }
}

/// Human-facing merchant name: whitespace collapsed, store numbers removed,
/// and ALL-CAPS or all-lowercase exports title-cased. Mixed-case input is
/// assumed to be intentional and is left alone.
pub fn display_name(raw: &str) -> String {
    let words: Vec<&str> = raw
        .split_whitespace()
        .filter(|t| !is_store_number(t))
        .collect();
    if words.is_empty() {
        return raw.trim().to_string();
    }

    let letters = || words.iter().flat_map(|w| w.chars()).filter(|c| c.is_alphabetic());
    let single_case = letters().all(|c| c.is_uppercase()) || letters().all(|c| c.is_lowercase());
    if !single_case {
        return words.join(" ");
    }

    words
        .iter()
        .map(|w| title_case(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    // AT&T, 7-ELEVEN, H2O: keep as written
    if word.chars().any(|c| c.is_ascii_digit() || c == '&') {
        return word.to_string();
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
