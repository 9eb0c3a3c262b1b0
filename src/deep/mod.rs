//! Deep loading of declared relation paths

mod loader;
mod plan;

pub use loader::DeepLoader;
pub use plan::{DeepPlan, DeepStep};
