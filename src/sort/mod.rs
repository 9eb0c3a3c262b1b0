//! Sort resolution: sort tokens to order terms and lookup joins

mod resolver;

pub use resolver::{OrderKey, OrderPlan, OrderTerm, SortResolver};
