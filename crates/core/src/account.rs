use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user-defined spending category. The engine only reads `id` and `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

impl Category {
    pub fn new(id: i64, name: &str) -> Self {
        Category {
            id: CategoryId(id),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A shared-balance account that part of an expense can be allocated to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
}

impl Account {
    pub fn new(id: i64, name: &str) -> Self {
        Account {
            id: AccountId(id),
            name: name.to_string(),
        }
    }
}

/// Whether a record takes money out (expense) or brings it in (income/payment).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    #[default]
    Expense,
    Income,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Expense => write!(f, "expense"),
            Kind::Income => write!(f, "income"),
        }
    }
}

impl FromStr for Kind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expense" => Ok(Kind::Expense),
            "income" => Ok(Kind::Income),
            other => Err(format!("Unknown kind: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrip() {
        assert_eq!(Kind::from_str(&Kind::Expense.to_string()).unwrap(), Kind::Expense);
        assert_eq!(Kind::from_str(&Kind::Income.to_string()).unwrap(), Kind::Income);
        assert!(Kind::from_str("transfer").is_err());
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Kind::Income).unwrap(), "\"income\"");
    }

    #[test]
    fn category_constructor() {
        let c = Category::new(7, "Coffee");
        assert_eq!(c.id, CategoryId(7));
        assert_eq!(c.name, "Coffee");
        assert_eq!(c.id.to_string(), "7");
    }
}
