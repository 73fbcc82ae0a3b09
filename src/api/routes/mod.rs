//! API route modules.

pub mod fields;
pub mod recording;
