use axum::http::Uri;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number (default: 1)
    #[serde(default)]
    #[param(required = false)]
    pub page: Option<u64>,
}

impl PageQuery {
    pub fn number(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Requested page number, rejected with 404 when it lies past the last
    /// page of `count` records. Must be checked before fetching.
    pub fn checked_number(&self, page_size: u64, count: u64) -> Result<u64, AppError> {
        let number = self.number();
        if number > num_pages(page_size, count) {
            return Err(AppError::NotFound(format!("page {}", number)));
        }
        Ok(number)
    }
}

// An empty result set still has one (empty) page
fn num_pages(page_size: u64, count: u64) -> u64 {
    count.div_ceil(page_size).max(1)
}

/// One page of a list endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct Page<T> {
    /// Total number of matching records
    pub count: u64,
    /// Link to the next page, if any
    pub next: Option<String>,
    /// Link to the previous page, if any
    pub previous: Option<String>,
    /// Records on this page
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Assembles a page, linking neighbours relative to the request URI.
    ///
    /// Requesting a page past the end is an error, except for page 1 of an
    /// empty result set.
    pub fn build(
        uri: &Uri,
        page: u64,
        page_size: u64,
        count: u64,
        results: Vec<T>,
    ) -> Result<Self, AppError> {
        let num_pages = num_pages(page_size, count);
        if page > num_pages {
            return Err(AppError::NotFound(format!("page {}", page)));
        }

        let next = (page < num_pages).then(|| page_link(uri, page + 1));
        let previous = (page > 1).then(|| page_link(uri, page - 1));

        Ok(Self {
            count,
            next,
            previous,
            results,
        })
    }
}

/// Rebuilds `uri` with its `page` parameter set to `page`, dropped for page 1.
pub fn page_link(uri: &Uri, page: u64) -> String {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.extend_pairs(pairs);
    if page > 1 {
        serializer.append_pair("page", &page.to_string());
    }
    let query = serializer.finish();

    if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_link_replaces_page_and_keeps_filters() {
        let uri: Uri = "/startups/?industry=AI&page=2&q=pay".parse().unwrap();
        assert_eq!(page_link(&uri, 3), "/startups/?industry=AI&q=pay&page=3");
        assert_eq!(page_link(&uri, 1), "/startups/?industry=AI&q=pay");
    }

    #[test]
    fn page_link_without_query() {
        let uri: Uri = "/notes/".parse().unwrap();
        assert_eq!(page_link(&uri, 2), "/notes/?page=2");
        assert_eq!(page_link(&uri, 1), "/notes/");
    }

    #[test]
    fn build_links_neighbours() {
        let uri: Uri = "/startups/?page=2".parse().unwrap();
        let page = Page::build(&uri, 2, 10, 25, vec![1, 2, 3]).unwrap();
        assert_eq!(page.count, 25);
        assert_eq!(page.next.as_deref(), Some("/startups/?page=3"));
        assert_eq!(page.previous.as_deref(), Some("/startups/"));
    }

    #[test]
    fn checked_number_rejects_out_of_range_pages() {
        let query = PageQuery { page: Some(u64::MAX) };
        assert!(matches!(query.checked_number(20, 100), Err(AppError::NotFound(_))));

        let query = PageQuery { page: Some(5) };
        assert_eq!(query.checked_number(20, 100).unwrap(), 5);
        assert!(query.checked_number(20, 80).is_err());

        let query = PageQuery { page: None };
        assert_eq!(query.checked_number(20, 0).unwrap(), 1);
    }

    #[test]
    fn build_rejects_pages_past_the_end() {
        let uri: Uri = "/startups/".parse().unwrap();
        assert!(Page::<u8>::build(&uri, 1, 10, 0, vec![]).is_ok());
        assert!(matches!(
            Page::<u8>::build(&uri, 3, 10, 20, vec![]),
            Err(AppError::NotFound(_))
        ));
    }
}
