use chrono::{DateTime, NaiveDate, Utc};

/// Column access used to evaluate a [`ListQuery`](super::ListQuery) in memory.
pub trait Filterable {
    fn text(&self, column: &str) -> Option<&str>;
    fn timestamp(&self, column: &str) -> Option<DateTime<Utc>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Case-insensitive equality.
    IExact,
    /// Case-insensitive substring.
    IContains,
    /// Calendar date (UTC) of a timestamp column.
    Date,
    Lt,
    Gt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterWhereInfo {
    pub column: &'static str,
    pub operator: FilterOp,
    pub data: FilterValue,
}

/// Every term must match at least one of `columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchInfo {
    pub terms: Vec<String>,
    pub columns: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOrderInfo {
    pub column: &'static str,
    pub sort: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    Number(u64),
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: PageNumber,
    pub size: u64,
}

/// Rows to return after filtering and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<FilterValue>,
}
