//! Flow and service filtering.
//!
//! - `FilterEntry`: one parsed `[direction:]kind=query` predicate
//! - `HttpStatusFilter`: exact code or status class
//! - `Filters`: the full active set the engine replays through

pub mod entry;
pub mod http;
pub mod set;

pub use entry::{FilterDirection, FilterEntry, FilterKind};
pub use http::HttpStatusFilter;
pub use set::{Filters, VisualFilters, VisualToggle};
