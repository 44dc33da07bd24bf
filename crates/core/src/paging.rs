//! Paging for candidate and assigned pools.

use serde::{Deserialize, Serialize};

/// Which slice of a pool to return.
///
/// `query` is matched case-insensitively as a substring of a concept's terminology id
/// or name. `max_results` is clamped to the configured maximum page size; `None` means
/// "as many as allowed".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub start: usize,
    pub max_results: Option<usize>,
    pub query: Option<String>,
}

impl PageRequest {
    pub fn new(start: usize, max_results: Option<usize>, query: Option<String>) -> Self {
        Self {
            start,
            max_results,
            query: query
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty()),
        }
    }

    fn matches(&self, terminology_id: &str, name: &str) -> bool {
        match &self.query {
            None => true,
            Some(query) => {
                let query = query.to_lowercase();
                terminology_id.to_lowercase().contains(&query)
                    || name.to_lowercase().contains(&query)
            }
        }
    }

    fn limit(&self, max_page_size: usize) -> usize {
        self.max_results
            .map_or(max_page_size, |wanted| wanted.min(max_page_size))
    }
}

/// A counted page of results. `total_count` is the size of the filtered pool before paging.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub total_count: usize,
    pub items: Vec<T>,
}

/// One pool entry together with the concept fields it is filtered and sorted by.
pub(crate) struct PageEntry<T> {
    pub terminology_id: String,
    pub name: String,
    pub item: T,
}

/// Filter, sort by terminology id, de-duplicate and slice `entries`.
pub(crate) fn paginate<T>(
    entries: Vec<PageEntry<T>>,
    request: &PageRequest,
    max_page_size: usize,
) -> Page<T> {
    let mut entries: Vec<PageEntry<T>> = entries
        .into_iter()
        .filter(|e| request.matches(&e.terminology_id, &e.name))
        .collect();
    entries.sort_by(|a, b| a.terminology_id.cmp(&b.terminology_id));
    entries.dedup_by(|a, b| a.terminology_id == b.terminology_id);

    let total_count = entries.len();
    let items = entries
        .into_iter()
        .skip(request.start)
        .take(request.limit(max_page_size))
        .map(|e| e.item)
        .collect();

    Page { total_count, items }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(ids: &[(&str, &str)]) -> Vec<PageEntry<String>> {
        ids.iter()
            .map(|(id, name)| PageEntry {
                terminology_id: id.to_string(),
                name: name.to_string(),
                item: id.to_string(),
            })
            .collect()
    }

    #[test]
    fn sorts_dedups_and_counts_before_slicing() {
        let page = paginate(
            entries(&[("3", "c"), ("1", "a"), ("2", "b"), ("1", "a")]),
            &PageRequest::new(1, Some(1), None),
            100,
        );
        assert_eq!(page.total_count, 3);
        assert_eq!(page.items, vec!["2".to_string()]);
    }

    #[test]
    fn query_matches_id_or_name_case_insensitively() {
        let page = paginate(
            entries(&[("22298006", "Myocardial infarction"), ("38341003", "Hypertension")]),
            &PageRequest::new(0, None, Some("INFARCT".into())),
            100,
        );
        assert_eq!(page.items, vec!["22298006".to_string()]);

        let page = paginate(
            entries(&[("22298006", "Myocardial infarction"), ("38341003", "Hypertension")]),
            &PageRequest::new(0, None, Some("3834".into())),
            100,
        );
        assert_eq!(page.items, vec!["38341003".to_string()]);
    }

    #[test]
    fn max_results_is_clamped() {
        let page = paginate(
            entries(&[("1", "a"), ("2", "b"), ("3", "c")]),
            &PageRequest::new(0, Some(50), None),
            2,
        );
        assert_eq!(page.total_count, 3);
        assert_eq!(page.items.len(), 2);
    }

    #[test]
    fn blank_query_is_ignored() {
        assert_eq!(PageRequest::new(0, None, Some("   ".into())).query, None);
    }
}
