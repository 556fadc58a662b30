//! Pulls date, description, merchant, amount, category and type text out of
//! a raw row using header keywords.

use chrono::NaiveDate;
use tally_core::Money;

/// Column positions detected once per table from its headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnLayout {
    pub date: Option<usize>,
    pub posted_date: Option<usize>,
    pub description: Option<usize>,
    pub merchant: Option<usize>,
    pub amount: Option<usize>,
    pub debit: Option<usize>,
    pub credit: Option<usize>,
    pub category: Option<usize>,
    pub kind: Option<usize>,
    /// Date, posted date, description, merchant, category, type, amount.
    pub fixed_seven: bool,
}

const FIXED_SEVEN_WIDTH: usize = 7;

fn is_posted_header(h: &str) -> bool {
    h.contains("post") || h.contains("clearing") || h.contains("cleared")
}

impl ColumnLayout {
    pub fn detect(headers: &[String]) -> Self {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |pred: &dyn Fn(&str) -> bool| lowered.iter().position(|h| pred(h.as_str()));

        let transaction_date = find(&|h| h.contains("transaction date") || h == "trans. date" || h == "trans date");
        let posted_date = find(&|h| h.contains("date") && is_posted_header(h));
        let date = transaction_date
            .or_else(|| find(&|h| h.contains("date") && !is_posted_header(h)))
            .or(posted_date);

        let description = find(&|h| h.contains("description")).or_else(|| {
            find(&|h| ["details", "memo", "payee", "narrative", "name"].iter().any(|k| h.contains(k)))
        });
        let merchant = find(&|h| h.contains("merchant"));

        let debit_credit = |h: &str| h.contains("debit") && h.contains("credit");
        let kind = find(&|h| h.contains("type")).or_else(|| find(&debit_credit));
        let debit = find(&|h| {
            !h.contains("type") && !debit_credit(h) && (h.contains("debit") || h.contains("withdrawal"))
        });
        let credit = find(&|h| {
            !h.contains("type") && !debit_credit(h) && (h.contains("credit") || h.contains("deposit"))
        });
        let amount = find(&|h| h.contains("amount") && !h.contains("debit") && !h.contains("credit"));
        let category = find(&|h| h.contains("category"));

        let has = |pred: &dyn Fn(&str) -> bool| lowered.iter().any(|h| pred(h.as_str()));
        let fixed_seven = has(&|h| h.contains("merchant"))
            && has(&|h| h.contains("type"))
            && has(&|h| h.contains("transaction date"))
            && has(&|h| is_posted_header(h));

        ColumnLayout {
            date,
            posted_date,
            description,
            merchant,
            amount,
            debit,
            credit,
            category,
            kind,
            fixed_seven,
        }
    }

    fn fixed_for(&self, row: &[String]) -> bool {
        self.fixed_seven && row.len() >= FIXED_SEVEN_WIDTH
    }
}

/// Raw text for one row after column resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFields {
    pub date_text: String,
    /// Falls back to `date_text` when the table has no posted column.
    pub posted_date_text: String,
    pub description: String,
    /// Falls back to `description` when blank.
    pub merchant: String,
    /// The amount column as written, or the debit/credit text it came from.
    pub amount_text: String,
    /// Signed: negative for money out when the export says so.
    pub amount: Option<Money>,
    pub category_text: String,
    pub type_text: String,
}

impl ResolvedFields {
    pub fn date(&self) -> Option<NaiveDate> {
        parse_date(&self.date_text).or_else(|| parse_date(&self.posted_date_text))
    }
}

fn cell(row: &[String], index: Option<usize>) -> String {
    index
        .and_then(|i| row.get(i))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

pub fn resolve_row(layout: &ColumnLayout, row: &[String]) -> ResolvedFields {
    let at = |i: usize| cell(row, Some(i));
    let (date_text, posted, description, merchant, category_text, type_text, amount_text, debit, credit) =
        if layout.fixed_for(row) {
            (at(0), at(1), at(2), at(3), at(4), at(5), at(6), String::new(), String::new())
        } else {
            (
                cell(row, layout.date),
                cell(row, layout.posted_date),
                cell(row, layout.description),
                cell(row, layout.merchant),
                cell(row, layout.category),
                cell(row, layout.kind),
                cell(row, layout.amount),
                cell(row, layout.debit),
                cell(row, layout.credit),
            )
        };

    let description = if description.is_empty() { merchant.clone() } else { description };
    let merchant = if merchant.is_empty() { description.clone() } else { merchant };
    let posted_date_text = if posted.is_empty() { date_text.clone() } else { posted };
    let amount = resolve_amount(&amount_text, &debit, &credit);
    let amount_text = if amount_text.is_empty() {
        if debit.is_empty() { credit } else { debit }
    } else {
        amount_text
    };

    ResolvedFields {
        date_text,
        posted_date_text,
        description,
        merchant,
        amount_text,
        amount,
        category_text,
        type_text,
    }
}

/// A leading `-`/`+` (after an optional currency symbol) or accounting parentheses.
pub fn has_explicit_sign(text: &str) -> bool {
    let t = text.trim();
    if t.starts_with('(') && t.ends_with(')') {
        return true;
    }
    let t = t.trim_start_matches('$').trim_start();
    t.starts_with('-') || t.starts_with('+')
}

fn parse_nonzero(text: &str) -> Option<Money> {
    text.parse::<Money>().ok().filter(|m| !m.is_zero())
}

/// Signed amount: an explicitly signed amount column wins, then a debit
/// (negated), then a credit, then the amount column read literally.
pub fn resolve_amount(amount: &str, debit: &str, credit: &str) -> Option<Money> {
    if has_explicit_sign(amount) {
        if let Ok(value) = amount.parse::<Money>() {
            return Some(value);
        }
    }
    if let Some(value) = parse_nonzero(debit) {
        return Some(-value.abs());
    }
    if let Some(value) = parse_nonzero(credit) {
        return Some(value.abs());
    }
    amount.parse().ok()
}

const NAMED_FORMATS: [&str; 6] = ["%b %d, %Y", "%B %d, %Y", "%b %d %Y", "%B %d %Y", "%d %b %Y", "%d %B %Y"];

fn expand_year(y: i32) -> i32 {
    if y < 100 {
        2000 + y
    } else {
        y
    }
}

/// Accepts ISO dates (with or without a time), US `M/D/Y`, day-first dates
/// when the first part cannot be a month, dotted `D.M.Y`, compact
/// `YYYYMMDD`, and month-name forms like `Jan 5, 2026`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in NAMED_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    let token = s.split_whitespace().next()?.split('T').next()?;
    if token.len() == 8 && token.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(token, "%Y%m%d").ok();
    }

    let dotted = token.contains('.');
    let parts: Vec<&str> = token.split(['/', '-', '.']).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let nums: Vec<u32> = parts.iter().filter_map(|p| p.parse().ok()).collect();
    if nums.len() != 3 {
        return None;
    }

    if parts[0].len() == 4 {
        return NaiveDate::from_ymd_opt(nums[0] as i32, nums[1], nums[2]);
    }
    let year = expand_year(nums[2] as i32);
    let (month, day) = if dotted || nums[0] > 12 {
        (nums[1], nums[0])
    } else {
        (nums[0], nums[1])
    };
    NaiveDate::from_ymd_opt(year, month, day)
}
