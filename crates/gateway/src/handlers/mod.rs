//! API handlers module

pub mod admin;
pub mod editor;
pub mod files;
pub mod form;
pub mod health;
pub mod papers;
pub mod payments;
pub mod production;
pub mod reviews;

use reviewflow_common::{errors::Result, workflow::PaperKey};

/// Parse a path segment holding either a paper id or a paper code
pub(crate) fn paper_key(raw: &str) -> Result<PaperKey> {
    raw.parse()
}
