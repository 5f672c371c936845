//! Core orchestration.

pub mod fleet;
