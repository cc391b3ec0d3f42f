//! Canonical import record schema
//!
//! This module defines the vendor-agnostic intermediate record that every
//! import path produces, and the boundary validation applied before merge.

mod adapter;
mod raw_record;

pub use adapter::*;
pub use raw_record::*;
