use std::cmp::Ordering;

use super::types::{FilterOrderInfo, Filterable, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Parses `first_name,-last_name`. Columns outside `allowed` are ignored.
    pub fn parse(spec: &str, allowed: &[&'static str]) -> Vec<FilterOrderInfo> {
        let mut out = Vec::new();
        for part in spec.split(',') {
            let trimmed = part.trim();
            let (name, sort) = match trimmed.strip_prefix('-') {
                Some(name) => (name, SortDirection::Desc),
                None => (trimmed, SortDirection::Asc),
            };
            if let Some(column) = allowed.iter().find(|c| **c == name) {
                out.push(FilterOrderInfo { column: *column, sort });
            }
        }
        out
    }

    /// `ORDER BY` clause; `tiebreak` columns always follow the requested ones.
    pub fn generate(infos: &[FilterOrderInfo], tiebreak: &[&str]) -> String {
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .chain(tiebreak.iter().map(|c| format!("\"{}\" ASC", c)))
            .collect();
        if parts.is_empty() {
            return String::new();
        }
        format!("ORDER BY {}", parts.join(", "))
    }

    /// Stable sort, so records keep their incoming order as the tiebreak.
    pub fn sort<R: Filterable>(infos: &[FilterOrderInfo], records: &mut [R]) {
        if infos.is_empty() {
            return;
        }
        records.sort_by(|a, b| {
            infos
                .iter()
                .map(|info| {
                    let ordering = compare_column(a, b, info.column);
                    match info.sort {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }
}

// Nulls sort last in ascending order.
fn compare_column<R: Filterable>(a: &R, b: &R, column: &str) -> Ordering {
    fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => a.cmp(&b),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
        }
    }

    match (a.text(column), b.text(column)) {
        (None, None) => nulls_last(a.timestamp(column), b.timestamp(column)),
        (a, b) => nulls_last(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    #[derive(Debug)]
    struct Row(&'static str, &'static str);

    impl Filterable for Row {
        fn text(&self, column: &str) -> Option<&str> {
            match column {
                "first_name" => Some(self.0),
                "last_name" => Some(self.1),
                _ => None,
            }
        }

        fn timestamp(&self, _column: &str) -> Option<DateTime<Utc>> {
            None
        }
    }

    const ALLOWED: &[&str] = &["first_name", "last_name"];

    #[test]
    fn parse_ignores_unknown_columns() {
        let infos = FilterOrder::parse("-last_name, info,first_name,", ALLOWED);
        assert_eq!(
            infos,
            vec![
                FilterOrderInfo { column: "last_name", sort: SortDirection::Desc },
                FilterOrderInfo { column: "first_name", sort: SortDirection::Asc },
            ]
        );
    }

    #[test]
    fn generate_appends_tiebreak() {
        let infos = FilterOrder::parse("-last_name", ALLOWED);
        assert_eq!(
            FilterOrder::generate(&infos, &["seq"]),
            "ORDER BY \"last_name\" DESC, \"seq\" ASC"
        );
        assert_eq!(FilterOrder::generate(&[], &[]), "");
    }

    #[test]
    fn sort_is_stable_and_multi_key() {
        let mut rows = vec![
            Row("Piet", "Jansen"),
            Row("Harrie", "Smulders"),
            Row("Peter", "Jansen"),
            Row("Piet", "Smulders"),
        ];
        FilterOrder::sort(&FilterOrder::parse("-last_name,first_name", ALLOWED), &mut rows);
        let names: Vec<_> = rows.iter().map(|r| format!("{} {}", r.0, r.1)).collect();
        assert_eq!(names, ["Harrie Smulders", "Piet Smulders", "Peter Jansen", "Piet Jansen"]);
    }
}
