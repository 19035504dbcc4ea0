use serde::Serialize;
use url::Url;

use super::error::FilterError;
use super::filter::PAGE_PARAM;
use super::types::{PageNumber, PageRequest, Slice};

/// A requested page checked against the number of matching records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub size: u64,
    pub count: u64,
    pub num_pages: u64,
}

impl PageRequest {
    /// An empty result still has one (empty) page; any other page past the
    /// end is [`FilterError::InvalidPage`].
    pub fn resolve(&self, count: u64) -> Result<PageWindow, FilterError> {
        let size = self.size.max(1);
        let num_pages = count.div_ceil(size).max(1);
        let number = match self.number {
            PageNumber::Last => num_pages,
            PageNumber::Number(n) if n >= 1 && n <= num_pages => n,
            PageNumber::Number(_) => return Err(FilterError::InvalidPage),
        };
        Ok(PageWindow {
            number,
            size,
            count,
            num_pages,
        })
    }
}

impl PageWindow {
    pub fn slice(&self) -> Slice {
        Slice {
            limit: self.size,
            offset: (self.number - 1) * self.size,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    /// Absolute `next`/`previous` links derived from the current request URL.
    pub fn links(&self, current: &Url) -> (Option<String>, Option<String>) {
        let next = self.has_next().then(|| with_page(current, Some(self.number + 1)));
        let previous = self.has_previous().then(|| {
            // The first page is addressed without a page number.
            let target = self.number - 1;
            with_page(current, (target > 1).then_some(target))
        });
        (next, previous)
    }
}

/// Paginated list response.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(window: &PageWindow, current: &Url, results: Vec<T>) -> Self {
        let (next, previous) = window.links(current);
        Self {
            count: window.count,
            next,
            previous,
            results,
        }
    }
}

/// `http://{host}{path_and_query}` as a URL.
pub fn absolute_url(host: &str, path_and_query: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("http://{}{}", host, path_and_query))
}

// Query parameters are re-encoded sorted by name.
fn with_page(current: &Url, page: Option<u64>) -> String {
    let mut pairs: Vec<(String, String)> = current
        .query_pairs()
        .filter(|(k, _)| k != PAGE_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if let Some(page) = page {
        pairs.push((PAGE_PARAM.to_string(), page.to_string()));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut url = current.clone();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(number: PageNumber, size: u64) -> PageRequest {
        PageRequest { number, size }
    }

    #[test]
    fn resolves_last_page() {
        let window = request(PageNumber::Last, 2).resolve(5).unwrap();
        assert_eq!(window.number, 3);
        assert_eq!(window.slice(), Slice { limit: 2, offset: 4 });
        assert!(!window.has_next());
    }

    #[test]
    fn empty_result_has_one_page() {
        let window = request(PageNumber::Number(1), 2).resolve(0).unwrap();
        assert_eq!(window.num_pages, 1);
        assert_eq!(request(PageNumber::Number(2), 2).resolve(0), Err(FilterError::InvalidPage));
    }

    #[test]
    fn page_past_the_end_is_invalid() {
        assert_eq!(request(PageNumber::Number(4), 2).resolve(6), Err(FilterError::InvalidPage));
    }

    #[test]
    fn links_replace_page_number() {
        let current = absolute_url("localhost:8000", "/archers/?size=2&pagenum=2&search=jan").unwrap();
        let window = request(PageNumber::Number(2), 2).resolve(5).unwrap();
        let (next, previous) = window.links(&current);
        assert_eq!(
            next.as_deref(),
            Some("http://localhost:8000/archers/?pagenum=3&search=jan&size=2")
        );
        assert_eq!(previous.as_deref(), Some("http://localhost:8000/archers/?search=jan&size=2"));
    }

    #[test]
    fn previous_link_of_page_two_drops_the_query_when_empty() {
        let current = absolute_url("localhost:8000", "/archers/?pagenum=2").unwrap();
        let window = request(PageNumber::Number(2), 2).resolve(3).unwrap();
        let (next, previous) = window.links(&current);
        assert!(next.is_none());
        assert_eq!(previous.as_deref(), Some("http://localhost:8000/archers/"));
    }
}
