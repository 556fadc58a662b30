use serde::{Deserialize, Serialize};

/// Header set used by adapters that synthesise rows (OCR, PDF text).
pub const FIXED_HEADERS: [&str; 5] = ["Date", "Description", "Amount", "Category", "Type"];

/// Adapter output: ordered headers and rows of raw string fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Physical 1-based line each row started on, when the adapter knows it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<usize>,
}

impl ParsedTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            headers,
            rows,
            lines: Vec::new(),
        }
    }

    /// Attaches the physical line of every row, in row order.
    pub fn with_source_lines(mut self, lines: Vec<usize>) -> Self {
        self.lines = lines;
        self
    }

    /// An empty table under [`FIXED_HEADERS`].
    pub fn with_fixed_headers() -> Self {
        Self {
            headers: FIXED_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Appends a row in [`FIXED_HEADERS`] order.
    pub fn push_fixed(&mut self, date: &str, description: &str, amount: &str, category: &str, kind: &str) {
        self.rows.push(
            [date, description, amount, category, kind]
                .iter()
                .map(|f| f.to_string())
                .collect(),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 1-based source line of a data row. Without recorded lines the row is
    /// assumed to follow the header with no gaps.
    pub fn source_line(&self, index: usize) -> usize {
        match self.lines.get(index) {
            Some(&line) => line,
            None => index + 1 + usize::from(!self.headers.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_rows_follow_header_order() {
        let mut table = ParsedTable::with_fixed_headers();
        table.push_fixed("01/05/2026", "STARBUCKS", "-4.75", "", "Purchase");
        assert_eq!(table.headers, FIXED_HEADERS.to_vec());
        assert_eq!(table.rows[0][2], "-4.75");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn source_lines_skip_header() {
        let table = ParsedTable::new(vec!["Date".into()], vec![vec![], vec![]]);
        assert_eq!(table.source_line(0), 2);
        let headerless = ParsedTable::new(vec![], vec![vec![]]);
        assert_eq!(headerless.source_line(0), 1);
    }

    #[test]
    fn recorded_lines_win() {
        let table = ParsedTable::new(vec!["Date".into()], vec![vec![], vec![]]).with_source_lines(vec![3, 7]);
        assert_eq!(table.source_line(0), 3);
        assert_eq!(table.source_line(1), 7);
    }
}
