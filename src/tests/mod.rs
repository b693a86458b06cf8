//! Tests for the crate-level data model.
//!
//! Tests are organized by domain:
//! - `role` - Role parsing and backend normalization
//! - `session` - Session/history conversion and timestamps
//! - `serialization` - JSON shape of the data model
