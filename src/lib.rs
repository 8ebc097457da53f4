//! Dual-frame state engine for a live service map.
//!
//! Change events (namespaces, services, links, flow batches) are folded into an
//! accumulating global frame and replayed through the active filter set into a
//! current frame that presentation layers read.

pub mod config;
pub mod controls;
pub mod domain;
pub mod error;
pub mod filter;
pub mod prefs;
pub mod render;
pub mod runtime;
pub mod store;

pub type Result<T> = anyhow::Result<T>;
