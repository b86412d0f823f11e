//! CLI command implementations.

pub mod common;
pub mod fetch;
pub mod pixel;
pub mod vectorize;
