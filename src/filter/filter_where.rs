use super::types::{FilterOp, FilterValue, FilterWhereInfo, Filterable, SearchInfo};

/// Builds a parameterized WHERE clause from filter conditions and search
/// terms, and evaluates the same conditions against in-memory records.
pub struct FilterWhere {
    param_values: Vec<FilterValue>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Returns the clause (without `WHERE`) and its bind values. Placeholders
    /// start at `$starting_param_index + 1`.
    pub fn generate(
        conditions: &[FilterWhereInfo],
        search: Option<&SearchInfo>,
        starting_param_index: usize,
    ) -> (String, Vec<FilterValue>) {
        let mut filter_where = Self::new(starting_param_index);
        let mut sql_conditions: Vec<String> = conditions
            .iter()
            .map(|condition| filter_where.build_sql_condition(condition))
            .collect();
        if let Some(search) = search {
            sql_conditions.extend(filter_where.build_search(search));
        }

        let where_clause = if sql_conditions.is_empty() {
            "1=1".to_string()
        } else {
            sql_conditions.join(" AND ")
        };
        (where_clause, filter_where.param_values)
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> String {
        let quoted_column = format!("\"{}\"", condition.column);
        match (&condition.operator, &condition.data) {
            (FilterOp::IExact, FilterValue::Text(text)) => {
                let param = self.param(FilterValue::Text(like_escape(text)));
                format!("{} ILIKE {}", quoted_column, param)
            }
            (FilterOp::IContains, FilterValue::Text(text)) => {
                let param = self.param(FilterValue::Text(format!("%{}%", like_escape(text))));
                format!("{} ILIKE {}", quoted_column, param)
            }
            (FilterOp::Date, data) => {
                let param = self.param(data.clone());
                format!("({} AT TIME ZONE 'UTC')::date = {}", quoted_column, param)
            }
            (FilterOp::Lt, data) => format!("{} < {}", quoted_column, self.param(data.clone())),
            (FilterOp::Gt, data) => format!("{} > {}", quoted_column, self.param(data.clone())),
            (_, data) => format!("{} = {}", quoted_column, self.param(data.clone())),
        }
    }

    fn build_search(&mut self, search: &SearchInfo) -> Vec<String> {
        search
            .terms
            .iter()
            .map(|term| {
                let param = self.param(FilterValue::Text(format!("%{}%", like_escape(term))));
                let alternatives: Vec<String> = search
                    .columns
                    .iter()
                    .map(|column| format!("\"{}\" ILIKE {}", column, param))
                    .collect();
                format!("({})", alternatives.join(" OR "))
            })
            .collect()
    }

    fn param(&mut self, value: FilterValue) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    /// In-memory equivalent of [`FilterWhere::generate`]. A null column
    /// never matches.
    pub fn matches<R: Filterable>(conditions: &[FilterWhereInfo], search: Option<&SearchInfo>, record: &R) -> bool {
        let conditions_hold = conditions.iter().all(|condition| Self::matches_condition(condition, record));
        let search_holds = search.map_or(true, |search| {
            search.terms.iter().all(|term| {
                let needle = term.to_lowercase();
                search
                    .columns
                    .iter()
                    .any(|column| record.text(column).is_some_and(|v| v.to_lowercase().contains(&needle)))
            })
        });
        conditions_hold && search_holds
    }

    fn matches_condition<R: Filterable>(condition: &FilterWhereInfo, record: &R) -> bool {
        let column = condition.column;
        match (&condition.operator, &condition.data) {
            (FilterOp::IExact, FilterValue::Text(text)) => record
                .text(column)
                .is_some_and(|v| v.to_lowercase() == text.to_lowercase()),
            (FilterOp::IContains, FilterValue::Text(text)) => record
                .text(column)
                .is_some_and(|v| v.to_lowercase().contains(&text.to_lowercase())),
            (FilterOp::Date, FilterValue::Date(date)) => {
                record.timestamp(column).is_some_and(|ts| ts.date_naive() == *date)
            }
            (FilterOp::Lt, FilterValue::Timestamp(bound)) => record.timestamp(column).is_some_and(|ts| ts < *bound),
            (FilterOp::Gt, FilterValue::Timestamp(bound)) => record.timestamp(column).is_some_and(|ts| ts > *bound),
            _ => false,
        }
    }
}

/// Escapes LIKE metacharacters so user input matches literally.
fn like_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
