use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One row of a list result, keyed by column name
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

/// How a filter value is compared against a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Case-insensitive substring, used for textual columns
    Contains,
    /// Exact match on the rendered value
    Equals,
}

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: String,
    /// Alternatives separated by `||` in the request; any one may match
    pub alternatives: Vec<String>,
    pub mode: MatchMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

/// Requested page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    All,
    Limit(usize),
}

/// List request in Sprunje form: `filters[f]=v`, `sorts[f]=asc`, `size`, `page`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: BTreeMap<String, String>,
    pub sorts: Vec<FilterOrderInfo>,
    pub size: Option<PageSize>,
    /// Zero-based page index
    pub page: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageInfo {
    pub page: usize,
    /// `None` when the whole result set was requested
    pub size: Option<usize>,
    pub total_pages: usize,
}

/// Paginated result envelope
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub rows: Vec<Row>,
    /// Distinct rows before filtering
    pub count: usize,
    /// Rows that survived filtering, before pagination
    pub count_filtered: usize,
    pub page_info: PageInfo,
}
