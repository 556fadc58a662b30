//! Import classification: turns a [`ParsedTable`] from any adapter into
//! reviewable [`CandidateRow`]s and, once reviewed, a [`CommitPlan`].

pub mod category_match;
pub mod commit;
pub mod csv;
pub mod duplicate;
pub mod fields;
pub mod kind;
pub mod mapper;
pub mod merchant;
pub mod mode;
pub mod review;
pub mod row;
pub mod table;

pub use category_match::{CategoryMatcher, CategorySuggestion, POSSIBLE_THRESHOLD, READY_THRESHOLD};
pub use commit::{Allocation, CommitPlan, NewRecord};
pub use crate::csv::{read_table, read_table_with_delimiter, CsvError};
pub use duplicate::{is_duplicate, DuplicateProbe};
pub use mapper::{map_table, ImportContext, RowMapper};
pub use merchant::{display_name, normalize_key};
pub use mode::{WorkflowMode, INCOME_ONLY_BLOCK_REASON};
pub use review::{ReviewError, ReviewSession, RowEdit};
pub use row::{Bucket, CandidateRow, RawFields, RowId};
pub use table::{ParsedTable, FIXED_HEADERS};
