//! Typed access to keyword blocks and their companion data streams.
//!
//! The surrounding model document is TOML. Every model variant receives a
//! [`block::KeywordBlock`] holding its own table and reads its keys through serde.

pub mod block;
pub mod table;
