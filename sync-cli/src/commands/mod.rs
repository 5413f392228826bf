//! CLI command implementations.

pub mod forget;
pub mod select;
pub mod simulate;
pub mod status;
