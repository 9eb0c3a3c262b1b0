//! Tuple sorting for in-memory execution
//!
//! Sort is stable and deterministic. Null sorts lowest: first ascending,
//! last descending.

use std::cmp::Ordering;

use serde_json::Value;

use super::filters::Tuple;
use super::value::compare_values;
use crate::request::SortDirection;
use crate::sort::{OrderKey, OrderTerm};

pub(super) struct ResultSorter;

impl ResultSorter {
    pub fn sort(tuples: &mut [Tuple<'_>], terms: &[OrderTerm]) {
        if terms.is_empty() {
            return;
        }
        tuples.sort_by(|a, b| Self::compare(a, b, terms));
    }

    fn compare(a: &Tuple<'_>, b: &Tuple<'_>, terms: &[OrderTerm]) -> Ordering {
        for term in terms {
            let ordering = compare_values(&Self::key(a, &term.key), &Self::key(b, &term.key));
            let ordering = match term.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn key(tuple: &Tuple<'_>, key: &OrderKey) -> Value {
        match key {
            OrderKey::Column(column) => tuple.value(column),
            OrderKey::Aggregate(alias) => tuple.aggregate(alias),
        }
    }
}
