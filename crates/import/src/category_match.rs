//! Category suggestion: scores CSV category text (or, when there is none,
//! the merchant name) against the user's categories.
//!
//! Resolution order, first hit wins:
//!
//! | step | signal                                | confidence  |
//! |------|---------------------------------------|-------------|
//! | 1    | learned rule with a category          | 1.00        |
//! | 2    | exact normalised name                 | 1.00        |
//! | 3    | singular/plural                       | 0.95        |
//! | 4    | shared synonym concept                | 0.90        |
//! | 5    | substring either direction            | 0.74        |
//! | 6    | token overlap                         | 0.55 – 0.70 |
//!
//! The numbers are tuned together with [`READY_THRESHOLD`] and
//! [`POSSIBLE_THRESHOLD`]; change them as a set or not at all.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tally_core::{Category, LearnedRule};

use crate::merchant::normalize_key;

/// Expense suggestions at or above this confidence are included by default.
pub const READY_THRESHOLD: f64 = 0.86;
/// Expense suggestions at or above this confidence are offered as a possible match.
pub const POSSIBLE_THRESHOLD: f64 = 0.55;

const LEARNED: f64 = 1.0;
const EXACT: f64 = 1.0;
const PLURAL: f64 = 0.95;
const SYNONYM: f64 = 0.90;
const CONTAINS: f64 = 0.74;
const OVERLAP_FLOOR: f64 = 0.55;
const OVERLAP_CEILING: f64 = 0.70;
const OVERLAP_BOOST: f64 = 0.35;

/// A group of words that all mean the same kind of spending. `brands` are
/// merchant names specific enough to categorise a row on their own.
#[derive(Debug)]
pub struct Concept {
    pub name: &'static str,
    pub synonyms: &'static [&'static str],
    pub brands: &'static [&'static str],
}

/// Concepts are tried in table order, so more specific groups come first
/// (coffee before dining, groceries before dining, utilities before fuel).
pub static CONCEPTS: &[Concept] = &[
    Concept {
        name: "coffee",
        synonyms: &["coffee", "cafe", "espresso", "latte"],
        brands: &["starbucks", "dunkin", "peets", "blue bottle", "tim hortons"],
    },
    Concept {
        name: "groceries",
        synonyms: &["grocery", "groceries", "supermarket", "market", "produce"],
        brands: &["whole foods", "trader joes", "safeway", "kroger", "aldi", "publix", "wegmans"],
    },
    Concept {
        name: "dining",
        synonyms: &[
            "dining", "restaurant", "food", "takeout", "fast food", "eatery", "bar",
            "meal", "lunch", "dinner", "pizza",
        ],
        brands: &["doordash", "grubhub", "uber eats", "mcdonalds", "chipotle"],
    },
    Concept {
        name: "utilities",
        synonyms: &[
            "utility", "utilities", "electric", "electricity", "water", "internet",
            "phone", "cable", "power",
        ],
        brands: &["comcast", "verizon", "at&t"],
    },
    Concept {
        name: "fuel",
        synonyms: &["fuel", "gas", "gasoline", "gas station"],
        brands: &["shell", "chevron", "exxon", "mobil"],
    },
    Concept {
        name: "transportation",
        synonyms: &[
            "transportation", "transport", "transit", "taxi", "parking", "rideshare",
            "toll", "train", "bus", "subway",
        ],
        brands: &["uber", "lyft"],
    },
    Concept {
        name: "travel",
        synonyms: &["travel", "airline", "airfare", "flight", "hotel", "lodging", "vacation"],
        brands: &["airbnb"],
    },
    Concept {
        name: "housing",
        synonyms: &["housing", "rent", "mortgage", "home", "hoa"],
        brands: &[],
    },
    Concept {
        name: "health",
        synonyms: &[
            "health", "healthcare", "medical", "pharmacy", "doctor", "dental",
            "hospital", "gym", "fitness",
        ],
        brands: &["cvs", "walgreens"],
    },
    Concept {
        name: "entertainment",
        synonyms: &[
            "entertainment", "movie", "movies", "cinema", "streaming", "music",
            "concert", "games", "gaming",
        ],
        brands: &["netflix", "spotify", "hulu"],
    },
    Concept {
        name: "shopping",
        synonyms: &["shopping", "retail", "clothing", "apparel", "merchandise"],
        brands: &["amazon", "target", "walmart"],
    },
    Concept {
        name: "subscriptions",
        synonyms: &["subscription", "subscriptions", "software", "membership"],
        brands: &[],
    },
    Concept {
        name: "insurance",
        synonyms: &["insurance", "premium"],
        brands: &["geico"],
    },
    Concept {
        name: "fees",
        synonyms: &["fee", "fees", "bank fee", "interest", "penalty"],
        brands: &[],
    },
    Concept {
        name: "education",
        synonyms: &["education", "tuition", "school", "books"],
        brands: &[],
    },
    Concept {
        name: "gifts",
        synonyms: &["gift", "gifts", "donation", "charity"],
        brands: &[],
    },
    Concept {
        name: "income",
        synonyms: &["income", "salary", "payroll", "paycheck", "wages", "deposit"],
        brands: &[],
    },
];

/// Drops one trailing `s` from keys longer than three characters.
fn singular(key: &str) -> &str {
    if key.chars().count() > 3 {
        key.strip_suffix('s').unwrap_or(key)
    } else {
        key
    }
}

/// Splits a key into its words, keeping `&` so `at&t` stays one word.
struct KeyWords<'k> {
    padded: String,
    words: Vec<&'k str>,
}

impl<'k> KeyWords<'k> {
    fn new(key: &'k str) -> Self {
        Self {
            padded: format!(" {key} "),
            words: key
                .split(|c: char| !c.is_alphanumeric() && c != '&')
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// Multi-word terms match as a whole phrase, single words match a word
    /// of the key in singular or plural.
    fn has(&self, term: &str) -> bool {
        if term.contains(' ') {
            self.padded.contains(&format!(" {term} "))
        } else {
            self.words.iter().any(|w| *w == term || singular(w) == term)
        }
    }
}

/// The first concept with a synonym or brand equal to the whole key,
/// contained in it as a whole phrase, or equal to one of its words.
pub fn concept_of(key: &str) -> Option<&'static Concept> {
    if key.is_empty() {
        return None;
    }
    let words = KeyWords::new(key);
    CONCEPTS
        .iter()
        .find(|concept| concept.synonyms.iter().chain(concept.brands).any(|t| words.has(t)))
}

/// Like [`concept_of`] but only brand names count, so generic words in a
/// merchant name ("Home Depot", "Corner Market") never select a category.
pub fn brand_concept_of(key: &str) -> Option<&'static Concept> {
    if key.is_empty() {
        return None;
    }
    let words = KeyWords::new(key);
    CONCEPTS
        .iter()
        .find(|concept| concept.brands.iter().any(|t| words.has(t)))
}

fn tokens(s: &str) -> HashSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

fn overlap_score(a: &HashSet<String>, b: &HashSet<String>) -> Option<f64> {
    let shared = a.intersection(b).count();
    if shared == 0 {
        return None;
    }
    let ratio = shared as f64 / a.len().max(b.len()) as f64;
    Some((ratio + OVERLAP_BOOST).clamp(OVERLAP_FLOOR, OVERLAP_CEILING))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySuggestion {
    pub category: Option<Category>,
    /// 0.0 to 1.0; compare against [`READY_THRESHOLD`] / [`POSSIBLE_THRESHOLD`].
    pub confidence: f64,
    /// Why this category was picked, for display and debugging.
    pub reason: String,
}

impl CategorySuggestion {
    fn hit(category: &Category, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            category: Some(category.clone()),
            confidence,
            reason: reason.into(),
        }
    }

    pub fn none(reason: impl Into<String>) -> Self {
        Self {
            category: None,
            confidence: 0.0,
            reason: reason.into(),
        }
    }
}

/// Holds the available categories with their normalised names precomputed.
pub struct CategoryMatcher<'a> {
    categories: &'a [Category],
    keys: Vec<String>,
}

impl<'a> CategoryMatcher<'a> {
    pub fn new(categories: &'a [Category]) -> Self {
        Self {
            categories,
            keys: categories.iter().map(|c| normalize_key(&c.name)).collect(),
        }
    }

    fn entries(&self) -> impl Iterator<Item = (&'a Category, &str)> + '_ {
        self.categories
            .iter()
            .zip(self.keys.iter().map(String::as_str))
            .filter(|(_, key)| !key.is_empty())
    }

    pub fn suggest(
        &self,
        csv_category: Option<&str>,
        merchant: &str,
        rule: Option<&LearnedRule>,
    ) -> CategorySuggestion {
        if let Some(id) = rule.and_then(|r| r.category_id) {
            if let Some(category) = self.categories.iter().find(|c| c.id == id) {
                return CategorySuggestion::hit(category, LEARNED, "Learned mapping");
            }
        }

        let csv_key = csv_category.map(normalize_key).unwrap_or_default();
        if csv_key.is_empty() {
            // Brand names ("Starbucks") are the only merchant signal worth
            // acting on without category text.
            return brand_concept_of(&normalize_key(merchant))
                .and_then(|concept| self.category_for(concept))
                .map(|(category, concept)| {
                    CategorySuggestion::hit(
                        category,
                        SYNONYM,
                        format!("Merchant synonym ({concept})"),
                    )
                })
                .unwrap_or_else(|| CategorySuggestion::none("No CSV category"));
        }

        if let Some((category, _)) = self.entries().find(|(_, key)| *key == csv_key) {
            return CategorySuggestion::hit(category, EXACT, "Exact category match");
        }

        let csv_singular = singular(&csv_key);
        if let Some((category, _)) = self.entries().find(|(_, key)| singular(key) == csv_singular) {
            return CategorySuggestion::hit(category, PLURAL, "Singular/plural match");
        }

        if let Some((category, concept)) = self.by_concept(&csv_key) {
            return CategorySuggestion::hit(category, SYNONYM, format!("Synonym match ({concept})"));
        }

        if let Some((category, _)) = self
            .entries()
            .find(|(_, key)| key.contains(csv_key.as_str()) || csv_key.contains(key))
        {
            return CategorySuggestion::hit(category, CONTAINS, "Partial name match");
        }

        let csv_tokens = tokens(&csv_key);
        let mut best: Option<(&Category, f64)> = None;
        for category in self.categories {
            let Some(score) = overlap_score(&csv_tokens, &tokens(&category.name)) else {
                continue;
            };
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((category, score));
            }
        }
        if let Some((category, score)) = best {
            return CategorySuggestion::hit(category, score, format!("Token overlap ({score:.2})"));
        }

        CategorySuggestion::none("No match")
    }

    fn by_concept(&self, key: &str) -> Option<(&'a Category, &'static str)> {
        self.category_for(concept_of(key)?)
    }

    fn category_for(&self, concept: &'static Concept) -> Option<(&'a Category, &'static str)> {
        self.entries()
            .find(|(_, name)| concept_of(name).is_some_and(|c| c.name == concept.name))
            .map(|(category, _)| (category, concept.name))
    }
}

/// One-shot form of [`CategoryMatcher::suggest`].
pub fn suggest(
    csv_category: Option<&str>,
    merchant: &str,
    categories: &[Category],
    rule: Option<&LearnedRule>,
) -> CategorySuggestion {
    CategoryMatcher::new(categories).suggest(csv_category, merchant, rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::CategoryId;

    fn cats(names: &[&str]) -> Vec<Category> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Category::new(i as i64 + 1, n))
            .collect()
    }

    fn name(s: &CategorySuggestion) -> Option<&str> {
        s.category.as_ref().map(|c| c.name.as_str())
    }

    // ── ordered resolution ────────────────────────────────────────────────────

    #[test]
    fn learned_rule_wins() {
        let categories = cats(&["Dining", "Coffee"]);
        let rule = LearnedRule {
            merchant_key: "starbucks".into(),
            display_name: None,
            category_id: Some(CategoryId(1)),
        };
        let s = suggest(Some("Coffee"), "Starbucks", &categories, Some(&rule));
        assert_eq!(name(&s), Some("Dining"));
        assert_eq!(s.confidence, 1.0);
        assert_eq!(s.reason, "Learned mapping");
    }

    #[test]
    fn learned_rule_with_unknown_category_is_ignored() {
        let categories = cats(&["Coffee"]);
        let rule = LearnedRule {
            merchant_key: "starbucks".into(),
            display_name: None,
            category_id: Some(CategoryId(99)),
        };
        let s = suggest(Some("Coffee"), "Starbucks", &categories, Some(&rule));
        assert_eq!(s.reason, "Exact category match");
    }

    #[test]
    fn empty_csv_category_without_brand() {
        let s = suggest(Some("  "), "Joe's Hardware", &cats(&["Coffee"]), None);
        assert_eq!(s, CategorySuggestion::none("No CSV category"));
        let s = suggest(None, "", &cats(&["Coffee"]), None);
        assert_eq!(s.reason, "No CSV category");
    }

    #[test]
    fn empty_csv_category_with_brand_merchant() {
        let s = suggest(None, "Starbucks", &cats(&["Groceries", "Coffee"]), None);
        assert_eq!(name(&s), Some("Coffee"));
        assert_eq!(s.confidence, 0.90);
    }

    #[test]
    fn generic_words_in_merchant_do_not_categorise() {
        let categories = cats(&["Coffee", "Rent", "Groceries", "Dining", "Utilities"]);
        for merchant in ["HOME DEPOT #4411", "Corner Market", "Sports Bar", "City Water Dept"] {
            let s = suggest(None, merchant, &categories, None);
            assert_eq!(s, CategorySuggestion::none("No CSV category"), "{merchant}");
        }
    }

    #[test]
    fn generic_words_still_count_as_category_text() {
        let s = suggest(Some("Home"), "Home Depot", &cats(&["Coffee", "Rent"]), None);
        assert_eq!(name(&s), Some("Rent"));
        assert_eq!(s.confidence, SYNONYM);
    }

    #[test]
    fn exact_match() {
        let s = suggest(Some("GROCERIES"), "x", &cats(&["Dining", "Groceries"]), None);
        assert_eq!(name(&s), Some("Groceries"));
        assert_eq!(s.confidence, 1.0);
    }

    #[test]
    fn plural_match() {
        let s = suggest(Some("Restaurant"), "x", &cats(&["Restaurants"]), None);
        assert_eq!(name(&s), Some("Restaurants"));
        assert_eq!(s.confidence, 0.95);
    }

    #[test]
    fn plural_not_applied_to_short_keys() {
        // "gas" is three characters, so "ga" is never compared
        let s = suggest(Some("Gas"), "x", &cats(&["Ga"]), None);
        assert_ne!(s.confidence, 0.95);
    }

    #[test]
    fn synonym_match() {
        let s = suggest(Some("Restaurants"), "x", &cats(&["Groceries", "Food & Dining"]), None);
        assert_eq!(name(&s), Some("Food & Dining"));
        assert_eq!(s.confidence, 0.90);
        assert_eq!(s.reason, "Synonym match (dining)");
    }

    #[test]
    fn synonym_picks_first_category_in_concept() {
        let s = suggest(Some("Supermarket"), "x", &cats(&["Grocery", "Groceries & Household"]), None);
        assert_eq!(name(&s), Some("Grocery"));
    }

    #[test]
    fn substring_match() {
        let s = suggest(Some("Pets"), "x", &cats(&["Pets & Vet"]), None);
        assert_eq!(name(&s), Some("Pets & Vet"));
        assert_eq!(s.confidence, 0.74);
    }

    #[test]
    fn token_overlap_band() {
        let s = suggest(
            Some("Home Improvement Supplies"),
            "x",
            &cats(&["Office Supplies", "Garden Supplies Outdoor"]),
            None,
        );
        // 1 shared token of 3 → 0.33 + 0.35 = 0.68
        assert!(s.confidence >= 0.55 && s.confidence <= 0.70, "{}", s.confidence);
        assert!(s.category.is_some());
    }

    #[test]
    fn token_overlap_prefers_higher_ratio() {
        let s = suggest(
            Some("Kids Sports League"),
            "x",
            &cats(&["Sports Equipment Store Purchases", "Kids Sports"]),
            None,
        );
        assert_eq!(name(&s), Some("Kids Sports"));
        assert_eq!(s.confidence, 0.70);
    }

    #[test]
    fn no_match() {
        let s = suggest(Some("Zzyzx"), "x", &cats(&["Coffee"]), None);
        assert_eq!(s, CategorySuggestion::none("No match"));
    }

    #[test]
    fn exact_beats_token_overlap() {
        let categories = cats(&["Pet Supplies Store", "Pet Supplies"]);
        let s = suggest(Some("Pet Supplies"), "x", &categories, None);
        assert_eq!(name(&s), Some("Pet Supplies"));
        assert_eq!(s.confidence, 1.0);
    }

    // ── concepts ──────────────────────────────────────────────────────────────

    #[test]
    fn concept_ordering() {
        assert_eq!(concept_of("whole foods market").unwrap().name, "groceries");
        assert_eq!(concept_of("food").unwrap().name, "dining");
        assert_eq!(concept_of("gas & electric").unwrap().name, "utilities");
        assert_eq!(concept_of("gas").unwrap().name, "fuel");
        assert!(concept_of("").is_none());
        assert!(concept_of("hardware").is_none());
    }

    #[test]
    fn brand_lookup_ignores_generic_synonyms() {
        assert_eq!(brand_concept_of("whole foods market").unwrap().name, "groceries");
        assert_eq!(brand_concept_of("at&t wireless").unwrap().name, "utilities");
        assert!(brand_concept_of("home depot").is_none());
        assert!(brand_concept_of("market").is_none());
        assert_eq!(concept_of("starbucks").unwrap().name, "coffee");
    }

    #[test]
    fn thresholds_are_ordered() {
        assert!(POSSIBLE_THRESHOLD < READY_THRESHOLD);
        assert!(SYNONYM >= READY_THRESHOLD);
        assert!(CONTAINS < READY_THRESHOLD && CONTAINS >= POSSIBLE_THRESHOLD);
    }
}
