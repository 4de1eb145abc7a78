use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::api::ApiError;
use crate::models::{Candidate, Job};

pub const MAX_PAGE_SIZE: usize = 1000;

/// A collection the list endpoints can search, sort and page through.
pub trait Listable {
    const DEFAULT_PAGE_SIZE: usize;
    /// Name of the numeric sort key, also the fallback ordering.
    const RANK_KEY: &'static str;
    /// Text fields accepted by `sort`.
    const SORT_KEYS: &'static [&'static str];

    fn haystack(&self) -> Vec<Cow<'_, str>>;
    fn sort_text(&self, key: &str) -> Option<&str>;
    fn rank(&self) -> i64;
}

impl Listable for Job {
    const DEFAULT_PAGE_SIZE: usize = 10;
    const RANK_KEY: &'static str = "order";
    const SORT_KEYS: &'static [&'static str] = &["title", "status"];

    // Tags are searched as one space-joined field, so "rust sql" matches
    // a job tagged both.
    fn haystack(&self) -> Vec<Cow<'_, str>> {
        vec![Cow::Borrowed(self.title.as_str()), Cow::Owned(self.tags.join(" "))]
    }

    fn sort_text(&self, key: &str) -> Option<&str> {
        match key {
            "title" => Some(self.title.as_str()),
            "status" => Some(self.status.as_str()),
            _ => None,
        }
    }

    fn rank(&self) -> i64 {
        self.order
    }
}

impl Listable for Candidate {
    const DEFAULT_PAGE_SIZE: usize = 25;
    const RANK_KEY: &'static str = "id";
    const SORT_KEYS: &'static [&'static str] = &["name", "email", "stage"];

    fn haystack(&self) -> Vec<Cow<'_, str>> {
        vec![Cow::Borrowed(self.name.as_str()), Cow::Borrowed(self.email.as_str())]
    }

    fn sort_text(&self, key: &str) -> Option<&str> {
        match key {
            "name" => Some(self.name.as_str()),
            "email" => Some(self.email.as_str()),
            "stage" => Some(self.stage.as_str()),
            _ => None,
        }
    }

    fn rank(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: usize,
    pub page_size: usize,
}

impl ListQuery {
    pub fn from_params<T: Listable>(params: &HashMap<String, String>) -> Result<Self, ApiError> {
        let search = params
            .get("search")
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let sort = match params.get("sort").map(|s| s.trim()).filter(|s| !s.is_empty()) {
            None => None,
            Some(key) if key == T::RANK_KEY || T::SORT_KEYS.contains(&key) => Some(key.to_string()),
            Some(key) => {
                let mut allowed = vec![T::RANK_KEY];
                allowed.extend_from_slice(T::SORT_KEYS);
                return Err(ApiError::Validation(format!(
                    "Cannot sort by '{key}' (expected one of: {})",
                    allowed.join(", ")
                )));
            }
        };
        let page = positive(params, "page")?.unwrap_or(1);
        let page_size = positive(params, "pageSize")?
            .unwrap_or(T::DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        Ok(Self {
            search,
            sort,
            page,
            page_size,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub items: Vec<T>,
}

/// Search, then `filter`, then sort, then slice out the requested page.
pub fn run<T: Listable>(items: Vec<T>, query: &ListQuery, filter: impl Fn(&T) -> bool) -> Page<T> {
    let mut matched: Vec<T> = items
        .into_iter()
        .filter(|item| matches_search(item, query.search.as_deref()))
        .filter(|item| filter(item))
        .collect();

    match query.sort.as_deref() {
        Some(key) if key != T::RANK_KEY => matched.sort_by(|a, b| {
            compare_text(a.sort_text(key), b.sort_text(key)).then_with(|| a.rank().cmp(&b.rank()))
        }),
        _ => matched.sort_by_key(|item| item.rank()),
    }

    let total = matched.len();
    let start = (query.page - 1).saturating_mul(query.page_size);
    let items = matched
        .into_iter()
        .skip(start)
        .take(query.page_size)
        .collect();

    Page {
        total,
        page: query.page,
        page_size: query.page_size,
        items,
    }
}

fn matches_search<T: Listable>(item: &T, needle: Option<&str>) -> bool {
    let Some(needle) = needle else { return true };
    item.haystack()
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

// Case-insensitive first so "apple" and "Apple" sit together, raw value
// breaks the tie.
fn compare_text(a: Option<&str>, b: Option<&str>) -> Ordering {
    let a = a.unwrap_or_default();
    let b = b.unwrap_or_default();
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn positive(params: &HashMap<String, String>, key: &str) -> Result<Option<usize>, ApiError> {
    match params.get(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(value) if value > 0 => Ok(Some(value)),
            _ => Err(ApiError::Validation(format!(
                "query parameter '{key}' must be a positive integer"
            ))),
        },
    }
}
