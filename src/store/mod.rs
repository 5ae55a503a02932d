pub mod dataset;
pub mod query;
