//! Output renderers for store snapshots.

pub mod html;
pub mod json;

pub use html::render_html_page;
pub use json::{render_json, render_summary};
