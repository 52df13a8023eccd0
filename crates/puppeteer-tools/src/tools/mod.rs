//! Individual tool implementations.

pub mod python;
pub mod read;
