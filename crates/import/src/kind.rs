use tally_core::{Kind, Money};

/// Type-column vocabulary, checked in order.
const TYPE_WORDS: &[(&[&str], Kind)] = &[
    (&["purchase", "debit"], Kind::Expense),
    (&["payment", "credit"], Kind::Income),
    (&["refund", "reversal"], Kind::Income),
    (&["fee", "interest"], Kind::Expense),
];

/// Description/category vocabulary for unsigned rows without a type.
const TEXT_WORDS: &[(&[&str], Kind)] = &[
    (&["payment", "autopay"], Kind::Income),
    (&["refund", "reversal"], Kind::Income),
    (&["fee", "interest"], Kind::Expense),
];

/// True when some word of `text` starts with one of `keywords`
/// ("Payments" matches "payment", "coffee" does not match "fee").
fn mentions(text: &str, keywords: &[&str]) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| keywords.iter().any(|k| word.starts_with(k)))
}

fn classify(text: &str, table: &[(&[&str], Kind)]) -> Option<Kind> {
    table
        .iter()
        .find(|(keywords, _)| mentions(text, keywords))
        .map(|(_, kind)| *kind)
}

/// Expense or income: explicit type text first, then a negative amount,
/// then description/category keywords. Anything undecided is an expense.
pub fn resolve_kind(type_text: &str, signed_amount: Option<Money>, description: &str, category_text: &str) -> Kind {
    if let Some(kind) = classify(type_text, TYPE_WORDS) {
        return kind;
    }
    if signed_amount.is_some_and(Money::is_negative) {
        return Kind::Expense;
    }
    classify(description, TEXT_WORDS)
        .or_else(|| classify(category_text, TEXT_WORDS))
        .unwrap_or(Kind::Expense)
}
