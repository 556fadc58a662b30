//! Turns recognized or PDF-extracted text into a [`ParsedTable`] with the
//! fixed `Date, Description, Amount, Category, Type` headers.
//!
//! Three layouts are tried in order: paycheck summaries (a `Net Pay` line),
//! statement listings (one `<date> <description> <amount>` per line) and,
//! failing both, a single receipt.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use tally_core::Money;
use tally_import::fields::parse_date;
use tally_import::ParsedTable;
use tracing::{debug, warn};

use crate::recognizer::OcrError;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

const MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";

re!(re_statement_line, &format!(
    r"(?i)^\s*(?P<date>\d{{1,2}}/\d{{1,2}}(?:/\d{{2,4}})?|\d{{4}}-\d{{2}}-\d{{2}}|(?:{MONTHS})[a-z]*\.?\s+\d{{1,2}}(?:,?\s+\d{{4}})?)\s+(?P<desc>.*?[a-z].*?)\s+(?P<amount>\(?[-+]?\$?\s?\d[\d,]*\.\d{{2}}\)?)(?P<cr>\s*cr\b)?(?:\s+\(?[-+]?\$?\d[\d,]*\.\d{{2}}\)?)?\s*$"
));
re!(re_leading_date, &format!(
    r"(?i)^\s*(?:\d{{1,2}}/\d{{1,2}}(?:/\d{{2,4}})?|\d{{4}}-\d{{2}}-\d{{2}}|(?:{MONTHS})[a-z]*\.?\s+\d{{1,2}})\s+"
));
re!(re_year, r"\b(20\d{2})\b");

re!(re_net_pay,
    r"(?i)\bnet\s+pay\b[^\d\n]*?\$?\s*(\d[\d,]*\.\d{2})");
re!(re_pay_date_line,
    r"(?im)^.*\b(?:pay|check|deposit)\s+date\b.*$");

re!(re_amount_label,
    r"(?i)\b(?:total|grand\s+total|amount\s+due|balance\s+due|total\s+due)\s*[:\$]?\s*\$?\s*([\d,]+\.\d{2})\b");
re!(re_currency,
    r"\$\s*([\d,]+\.\d{2})");

re!(re_date_month_name,
    r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2}),?\s+(\d{4})\b");
re!(re_date_abbr_month,
    r"(?i)\b(\d{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\.?\s+(\d{4})\b");
re!(re_date_iso,
    r"\b(\d{4})-(\d{2})-(\d{2})\b");
re!(re_date_slash,
    r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b");

re!(re_phone,
    r"\(?\d{3}\)?[\s\-]\d{3}[\s\-]\d{4}");
re!(re_url,
    r"(?i)(https?://|www\.)\S+");
re!(re_paystub_label,
    r"(?i)\b(?:pay|earnings|statement|stub|period|net|gross|date|employee|ssn|deductions?)\b");

const PURCHASE: &str = "Purchase";
const CREDIT: &str = "Credit";
const PAYMENT: &str = "Payment";

/// Extracts rows from `text`. Empty text is [`OcrError::NoText`]; text with
/// no usable row is [`OcrError::NoTransactions`].
pub fn extract_table(text: &str) -> Result<ParsedTable, OcrError> {
    if text.trim().is_empty() {
        return Err(OcrError::NoText);
    }

    let table = paycheck(text)
        .or_else(|| statement(text))
        .or_else(|| receipt(text))
        .ok_or(OcrError::NoTransactions)?;

    debug!(rows = table.len(), "extracted table from text");
    Ok(table)
}

// ── Statements ───────────────────────────────────────────────────────────────

fn statement(text: &str) -> Option<ParsedTable> {
    let year = re_year()
        .captures(text)
        .and_then(|c| c.get(1)?.as_str().parse::<i32>().ok());

    let mut table = ParsedTable::with_fixed_headers();
    let mut skipped = 0usize;
    for line in text.lines() {
        let Some(c) = re_statement_line().captures(line) else {
            if re_leading_date().is_match(line) {
                skipped += 1;
            }
            continue;
        };
        let (Some(date), Some(desc), Some(amount)) = (c.name("date"), c.name("desc"), c.name("amount")) else {
            continue;
        };
        let Ok(value) = amount.as_str().parse::<Money>() else {
            skipped += 1;
            continue;
        };
        let credit = c.name("cr").is_some() || value.is_negative();
        let description = strip_leading_date(desc.as_str());

        table.push_fixed(
            &normalize_date(date.as_str(), year),
            &description,
            &plain_amount(value),
            "",
            if credit { CREDIT } else { PURCHASE },
        );
    }

    if skipped > 0 {
        warn!(skipped, "skipped unreadable statement lines");
    }
    (!table.is_empty()).then_some(table)
}

/// Drops a posting date that follows the transaction date.
fn strip_leading_date(desc: &str) -> String {
    let rest = re_leading_date().replace(desc, "");
    rest.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// ISO date text when the date can be read, completing a missing year from
/// the statement; otherwise the text as found.
fn normalize_date(text: &str, year: Option<i32>) -> String {
    let cleaned = text.replace('.', "");
    let cleaned = cleaned.trim();
    if let Some(date) = parse_date(cleaned) {
        return iso(date);
    }
    if let Some(year) = year {
        let with_year = if cleaned.contains('/') {
            format!("{cleaned}/{year}")
        } else {
            format!("{cleaned}, {year}")
        };
        if let Some(date) = parse_date(&with_year) {
            return iso(date);
        }
    }
    cleaned.to_string()
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn plain_amount(value: Money) -> String {
    format!("{:.2}", value.abs().as_decimal())
}

// ── Paychecks ────────────────────────────────────────────────────────────────

fn paycheck(text: &str) -> Option<ParsedTable> {
    let c = re_net_pay().captures(text)?;
    let net: Money = c.get(1)?.as_str().parse().ok()?;
    if net.is_zero() {
        return None;
    }

    let date = re_pay_date_line()
        .find(text)
        .and_then(|m| first_date(m.as_str()))
        .or_else(|| first_date(text))
        .map(iso)
        .unwrap_or_default();
    let employer = heading_lines(text)
        .find(|l| !re_paystub_label().is_match(l))
        .unwrap_or("Paycheck");

    let mut table = ParsedTable::with_fixed_headers();
    table.push_fixed(&date, employer, &plain_amount(net), "", PAYMENT);
    Some(table)
}

// ── Receipts ─────────────────────────────────────────────────────────────────

fn receipt(text: &str) -> Option<ParsedTable> {
    let total = receipt_total(text)?;
    let vendor = receipt_vendor(text).unwrap_or_default();
    let date = first_date(text).map(iso).unwrap_or_default();

    let mut table = ParsedTable::with_fixed_headers();
    table.push_fixed(&date, vendor, &plain_amount(total), "", PURCHASE);
    Some(table)
}

/// Candidate name lines near the top: no phone, URL, date or leading digit.
fn heading_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .take(10)
        .map(str::trim)
        .filter(|l| l.len() >= 3 && l.len() <= 50)
        .filter(|l| l.chars().any(char::is_alphabetic))
        .filter(|l| !re_phone().is_match(l))
        .filter(|l| !re_url().is_match(l))
        .filter(|l| first_date(l).is_none())
        .filter(|l| !l.starts_with(|c: char| c.is_ascii_digit()))
}

fn receipt_vendor(text: &str) -> Option<&str> {
    let all_caps = |l: &&str| l.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase);
    heading_lines(text)
        .find(all_caps)
        .or_else(|| heading_lines(text).next())
}

fn receipt_total(text: &str) -> Option<Money> {
    // Prefer a labeled total over any raw dollar amount.
    if let Some(c) = re_amount_label().captures(text) {
        if let Some(total) = c.get(1).and_then(|m| m.as_str().parse::<Money>().ok()) {
            return Some(total);
        }
    }
    re_currency()
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<Money>().ok())
        .max()
        .filter(|m| !m.is_zero())
}

// ── Date helpers ─────────────────────────────────────────────────────────────

/// The first recognisable date, trying the least ambiguous forms first.
fn first_date(text: &str) -> Option<NaiveDate> {
    try_date_month_name(text)
        .or_else(|| try_date_abbr_month(text))
        .or_else(|| try_date_iso(text))
        .or_else(|| try_date_slash(text))
}

fn try_date_month_name(text: &str) -> Option<NaiveDate> {
    let c = re_date_month_name().captures(text)?;
    parse_date(&format!("{} {}, {}", c.get(1)?.as_str(), c.get(2)?.as_str(), c.get(3)?.as_str()))
}

fn try_date_abbr_month(text: &str) -> Option<NaiveDate> {
    let c = re_date_abbr_month().captures(text)?;
    parse_date(&format!("{} {} {}", c.get(1)?.as_str(), c.get(2)?.as_str(), c.get(3)?.as_str()))
}

fn try_date_iso(text: &str) -> Option<NaiveDate> {
    parse_date(re_date_iso().find(text)?.as_str())
}

fn try_date_slash(text: &str) -> Option<NaiveDate> {
    parse_date(re_date_slash().find(text)?.as_str())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
