//! Pure filter/sort helpers over a fetched product list. Cheap enough to
//! re-run on every keystroke.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::CATEGORY_ALL;
use crate::error::QueryError;
use crate::models::Product;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Keep the fetched order.
    #[default]
    Default,
    PriceAsc,
    PriceDesc,
    /// Highest rated first; unrated listings count as zero.
    Rating,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Rating => "rating",
        }
    }
}

impl FromStr for SortMode {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "rating" => Ok(Self::Rating),
            other => Err(QueryError::UnknownSortMode(other.to_string())),
        }
    }
}

/// Products whose title or category contains `search` (case-insensitive),
/// restricted to `category` unless it is "All". Order is preserved.
///
/// `search` is matched as typed: only the empty string matches everything,
/// surrounding whitespace is part of the needle.
pub fn filter(products: &[Product], search: &str, category: &str) -> Vec<Product> {
    let needle = search.to_lowercase();
    products
        .iter()
        .filter(|p| {
            needle.is_empty()
                || p.title.to_lowercase().contains(&needle)
                || p.category.to_lowercase().contains(&needle)
        })
        .filter(|p| category == CATEGORY_ALL || p.category == category)
        .cloned()
        .collect()
}

/// Stable sort; ties keep their incoming order.
pub fn sort(mut products: Vec<Product>, mode: SortMode) -> Vec<Product> {
    match mode {
        SortMode::Default => {}
        SortMode::PriceAsc => products.sort_by(|a, b| cmp_f64(a.price, b.price)),
        SortMode::PriceDesc => products.sort_by(|a, b| cmp_f64(b.price, a.price)),
        SortMode::Rating => products.sort_by(|a, b| cmp_f64(b.rate(), a.rate())),
    }
    products
}

/// `filter` then `sort`, the way the listing screen derives its view.
pub fn browse(products: &[Product], search: &str, category: &str, mode: SortMode) -> Vec<Product> {
    sort(filter(products, search, category), mode)
}

/// The `n` most recently created products, newest first. Products without
/// a timestamp sort last.
pub fn recommended(products: &[Product], n: usize) -> Vec<Product> {
    let mut out = products.to_vec();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out.truncate(n);
    out
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
