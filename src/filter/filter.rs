use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{
    FilterOp, FilterOrderInfo, FilterValue, FilterWhereInfo, Filterable, PageNumber, PageRequest, SearchInfo,
    SqlResult,
};
use crate::config::PaginationConfig;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub const SEARCH_PARAM: &str = "search";
pub const ORDERING_PARAM: &str = "ordering";
pub const PAGE_PARAM: &str = "pagenum";
pub const SIZE_PARAM: &str = "size";

/// Query-string filter bound to one column.
#[derive(Debug, Clone, Copy)]
pub struct FilterField {
    pub param: &'static str,
    pub column: &'static str,
    pub operator: FilterOp,
}

impl FilterField {
    pub const fn new(param: &'static str, column: &'static str, operator: FilterOp) -> Self {
        Self { param, column, operator }
    }
}

/// The filters, search columns, orderable columns and pagination a list
/// endpoint accepts.
#[derive(Debug, Clone, Copy)]
pub struct FilterSet {
    pub fields: &'static [FilterField],
    pub search_fields: &'static [&'static str],
    pub ordering_fields: &'static [&'static str],
    pub paginate: bool,
}

impl FilterSet {
    /// Turns query parameters into a [`ListQuery`]. Blank filter values are
    /// ignored; when a parameter repeats, the last value wins.
    pub fn parse(&self, params: &[(String, String)], pagination: &PaginationConfig) -> Result<ListQuery, FilterError> {
        let mut query = ListQuery::default();

        for field in self.fields {
            let Some(raw) = last_value(params, field.param).map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };
            query.conditions.push(FilterWhereInfo {
                column: field.column,
                operator: field.operator,
                data: parse_value(field, raw)?,
            });
        }

        if !self.search_fields.is_empty() {
            if let Some(raw) = last_value(params, SEARCH_PARAM) {
                let terms: Vec<String> = raw
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
                if !terms.is_empty() {
                    query.search = Some(SearchInfo {
                        terms,
                        columns: self.search_fields,
                    });
                }
            }
        }

        if let Some(raw) = last_value(params, ORDERING_PARAM) {
            query.order = FilterOrder::parse(raw, self.ordering_fields);
        }

        if self.paginate {
            query.page = parse_page(params, pagination)?;
        }

        tracing::debug!(
            conditions = query.conditions.len(),
            search = query.search.is_some(),
            order = query.order.len(),
            paginated = query.page.is_some(),
            "parsed list query"
        );
        Ok(query)
    }
}

/// Parsed list parameters for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub conditions: Vec<FilterWhereInfo>,
    pub search: Option<SearchInfo>,
    pub order: Vec<FilterOrderInfo>,
    pub page: Option<PageRequest>,
}

impl ListQuery {
    pub fn matches<R: Filterable>(&self, record: &R) -> bool {
        FilterWhere::matches(&self.conditions, self.search.as_ref(), record)
    }

    /// Applies the requested order; records keep their current order otherwise.
    pub fn sort<R: Filterable>(&self, records: &mut [R]) {
        FilterOrder::sort(&self.order, records)
    }

    pub fn to_where_sql(&self) -> SqlResult {
        let (query, params) = FilterWhere::generate(&self.conditions, self.search.as_ref(), 0);
        SqlResult { query, params }
    }

    pub fn to_order_sql(&self, tiebreak: &[&str]) -> String {
        FilterOrder::generate(&self.order, tiebreak)
    }
}

fn last_value<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params.iter().rev().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn parse_value(field: &FilterField, raw: &str) -> Result<FilterValue, FilterError> {
    match field.operator {
        FilterOp::IExact | FilterOp::IContains => Ok(FilterValue::Text(raw.to_string())),
        FilterOp::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(FilterValue::Date)
            .map_err(|_| FilterError::invalid_value(field.param, "Enter a valid date.")),
        FilterOp::Lt | FilterOp::Gt => parse_timestamp(raw)
            .map(FilterValue::Timestamp)
            .ok_or_else(|| FilterError::invalid_value(field.param, "Enter a valid date/time.")),
    }
}

/// RFC 3339, a naive `YYYY-MM-DD[ T]HH:MM[:SS]` taken as UTC, or a bare date
/// meaning midnight UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    // A literal '+' in a query string decodes to a space.
    let repaired = match raw.rfind(' ') {
        Some(i) if raw.len() - i == 6 => format!("{}+{}", &raw[..i], &raw[i + 1..]),
        _ => raw.to_string(),
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&repaired) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Pagination is only active when `pagenum` or `size` is present.
fn parse_page(params: &[(String, String)], config: &PaginationConfig) -> Result<Option<PageRequest>, FilterError> {
    let number = last_value(params, PAGE_PARAM).map(str::trim);
    let size = last_value(params, SIZE_PARAM).map(str::trim);
    if number.is_none() && size.is_none() {
        return Ok(None);
    }

    let max = u64::from(config.max_page_size);
    let size = size
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|s| *s > 0)
        .map(|s| s.min(max))
        .unwrap_or_else(|| u64::from(config.page_size));

    let number = match number {
        None | Some("") => PageNumber::Number(1),
        Some("last") => PageNumber::Last,
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .map(PageNumber::Number)
            .ok_or(FilterError::InvalidPage)?,
    };

    Ok(Some(PageRequest { number, size }))
}
