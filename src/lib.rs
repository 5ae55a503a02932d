pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod fetch;
pub mod mail;
pub mod source;
pub mod store;

pub use domain::email::{EmailRecord, FailureKind, FetchOutcome, FetchSession, Source};
pub use domain::range::DateRange;
pub use error::{FetchError, Result};
pub use fetch::{FetchConfig, FetchController, FetchHandle, FetchMode, fetch};
pub use store::dataset::Dataset;
pub use store::query::{QueryView, SearchScope, SortDirection, SortKey};
