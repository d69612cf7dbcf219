//! Shared dynocopy data and error model types.
//!
//! This crate is dependency-light so it can sit on both sides of the
//! `TableStore` boundary: the engine consumes it, and any store
//! implementation produces it.

pub mod descriptor;
pub mod error;
pub mod item;
