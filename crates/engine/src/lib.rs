//! Core of the report-dashboard runtime.
//!
//! Everything in this crate is target-independent: the report registry, the
//! filter/query machinery, the caching fetch coordinator and the payload
//! renderers know nothing about the DOM. The `frontend` crate plugs in a
//! browser transport and wires the pieces to markup.

pub mod fetcher;
pub mod filters;
pub mod format;
pub mod registry;
pub mod render;

mod error;

pub use error::ReportError;

/// Report payloads stay untyped: every endpoint returns its own shape of
/// precomputed display fields, so the registry addresses them by path
/// instead of deserializing into per-report structs.
pub type Payload = serde_json::Value;
