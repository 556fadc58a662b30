use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::account::CategoryId;

/// A remembered merchant mapping, created only when a reviewer opts in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedRule {
    pub merchant_key: String,
    pub display_name: Option<String>,
    pub category_id: Option<CategoryId>,
}

/// Learned rules keyed by merchant key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnedRules {
    rules: HashMap<String, LearnedRule>,
}

impl LearnedRules {
    pub fn new(rules: impl IntoIterator<Item = LearnedRule>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|rule| (rule.merchant_key.clone(), rule))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&LearnedRule> {
        if key.is_empty() {
            return None;
        }
        self.rules.get(key)
    }

    /// Tries the merchant-derived key first, then the description-derived key.
    pub fn lookup(&self, merchant_key: &str, description_key: &str) -> Option<&LearnedRule> {
        self.get(merchant_key).or_else(|| self.get(description_key))
    }

    pub fn insert(&mut self, rule: LearnedRule) {
        self.rules.insert(rule.merchant_key.clone(), rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LearnedRule> {
        self.rules.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(key: &str, name: Option<&str>, category: Option<i64>) -> LearnedRule {
        LearnedRule {
            merchant_key: key.to_string(),
            display_name: name.map(str::to_string),
            category_id: category.map(CategoryId),
        }
    }

    #[test]
    fn lookup_prefers_merchant_key() {
        let rules = LearnedRules::new(vec![
            rule("starbucks", Some("Starbucks"), Some(1)),
            rule("sq starbucks", Some("SQ Starbucks"), Some(2)),
        ]);
        let hit = rules.lookup("starbucks", "sq starbucks").unwrap();
        assert_eq!(hit.category_id, Some(CategoryId(1)));
    }

    #[test]
    fn lookup_falls_back_to_description_key() {
        let rules = LearnedRules::new(vec![rule("amazon mktp", None, Some(3))]);
        let hit = rules.lookup("amazon", "amazon mktp").unwrap();
        assert_eq!(hit.category_id, Some(CategoryId(3)));
    }

    #[test]
    fn empty_keys_never_match() {
        let rules = LearnedRules::new(vec![rule("", Some("Ghost"), None)]);
        assert!(rules.lookup("", "").is_none());
    }

    #[test]
    fn insert_replaces_existing_key() {
        let mut rules = LearnedRules::new(vec![rule("target", None, Some(1))]);
        rules.insert(rule("target", Some("Target"), Some(2)));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.get("target").unwrap().category_id, Some(CategoryId(2)));
    }
}
