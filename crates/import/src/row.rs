use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tally_core::{AccountId, Category, ExistingRecords, Kind, Money};
use tracing::debug;

use crate::category_match::{CategorySuggestion, POSSIBLE_THRESHOLD, READY_THRESHOLD};
use crate::duplicate::{is_duplicate, DuplicateProbe};

/// Stable per-row identity, assigned once by the row mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Review grouping. A flat tag, recomputed whenever a row's data changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Ready,
    PossibleMatch,
    Payment,
    PossibleDuplicate,
    NeedsMoreData,
}

impl Bucket {
    pub const ALL: [Bucket; 5] = [
        Bucket::Ready,
        Bucket::PossibleMatch,
        Bucket::Payment,
        Bucket::PossibleDuplicate,
        Bucket::NeedsMoreData,
    ];
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Ready => write!(f, "ready"),
            Bucket::PossibleMatch => write!(f, "possible_match"),
            Bucket::Payment => write!(f, "payment"),
            Bucket::PossibleDuplicate => write!(f, "possible_duplicate"),
            Bucket::NeedsMoreData => write!(f, "needs_more_data"),
        }
    }
}

impl FromStr for Bucket {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(Bucket::Ready),
            "possible_match" => Ok(Bucket::PossibleMatch),
            "payment" => Ok(Bucket::Payment),
            "possible_duplicate" => Ok(Bucket::PossibleDuplicate),
            "needs_more_data" => Ok(Bucket::NeedsMoreData),
            other => Err(format!("Unknown bucket: '{other}'")),
        }
    }
}

/// The source text exactly as the adapter produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFields {
    pub date: String,
    pub description: String,
    pub merchant: String,
    pub amount: String,
    pub category: String,
}

/// One resolved import candidate.
///
/// Rows are only created by the row mapper and only changed through
/// [`crate::review::ReviewSession`], which keeps `include`, `bucket`,
/// `duplicate` and `blocked` consistent with the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRow {
    pub id: RowId,
    pub line: usize,
    pub raw: RawFields,
    pub merchant_key: String,
    pub description_key: String,
    pub date: Option<NaiveDate>,
    pub merchant: String,
    /// Unsigned; zero when the source amount or date could not be read.
    pub amount: Money,
    pub kind: Kind,
    pub suggestion: CategorySuggestion,
    /// The category the row will be committed with. Expenses only.
    pub category: Option<Category>,
    pub account: Option<AccountId>,
    pub split_amount: String,
    pub remember: bool,
    pub blocked: Option<String>,
    pub include: bool,
    pub duplicate: bool,
    pub bucket: Bucket,
}

impl CandidateRow {
    fn lacks_core_data(&self) -> bool {
        self.merchant.trim().is_empty() || self.date.is_none() || self.amount.is_zero()
    }

    /// Rows missing a merchant, date, amount or (for expenses) a category can
    /// never be included.
    pub fn missing_required_data(&self) -> bool {
        self.lacks_core_data() || (self.kind == Kind::Expense && self.category.is_none())
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.is_some()
    }

    /// Confidence behind the selected category: the suggestion's score when
    /// the reviewer kept it, full confidence for a hand-picked category.
    pub fn category_confidence(&self) -> f64 {
        match (&self.category, &self.suggestion.category) {
            (None, _) => 0.0,
            (Some(selected), Some(suggested)) if selected.id == suggested.id => self.suggestion.confidence,
            (Some(_), _) => 1.0,
        }
    }

    pub fn probe(&self) -> Option<DuplicateProbe<'_>> {
        let date = self.date?;
        if self.amount.is_zero() {
            return None;
        }
        Some(DuplicateProbe {
            date,
            amount: self.amount,
            merchant_key: &self.merchant_key,
            description_key: &self.description_key,
            category_id: self.category.as_ref().map(|c| c.id),
            kind: self.kind,
        })
    }

    /// Bucket and default inclusion, by precedence: duplicate, missing core
    /// data, income, then expense confidence.
    fn classify(&self) -> (Bucket, bool) {
        if self.duplicate {
            return (Bucket::PossibleDuplicate, false);
        }
        if self.lacks_core_data() {
            return (Bucket::NeedsMoreData, false);
        }
        match self.kind {
            Kind::Income => (Bucket::Payment, true),
            Kind::Expense if self.category.is_none() => (Bucket::NeedsMoreData, false),
            Kind::Expense => {
                let confidence = self.category_confidence();
                if confidence >= READY_THRESHOLD {
                    (Bucket::Ready, true)
                } else if confidence >= POSSIBLE_THRESHOLD {
                    (Bucket::PossibleMatch, false)
                } else {
                    (Bucket::NeedsMoreData, false)
                }
            }
        }
    }

    /// Reassigns bucket and include from the current fields. Idempotent.
    pub(crate) fn assign_bucket(&mut self) {
        let (bucket, include) = self.classify();
        self.bucket = bucket;
        self.include = include && !self.is_blocked() && !self.missing_required_data();
        if self.is_blocked() {
            self.remember = false;
        }
    }

    /// Recomputes the duplicate hint from the full snapshot, then the bucket.
    pub(crate) fn refresh(&mut self, existing: &ExistingRecords) {
        self.duplicate = self.probe().is_some_and(|p| is_duplicate(&p, existing));
        self.assign_bucket();
        debug!(
            row = %self.id,
            line = self.line,
            bucket = %self.bucket,
            include = self.include,
            "row classified"
        );
    }
}
