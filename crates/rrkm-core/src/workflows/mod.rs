//! # Workflows Module
//!
//! Top-level entry points that turn a complete model document into a ready
//! registry of species.
//!
//! ## Architecture
//!
//! - **Loading** ([`load`]) - Parses the `[config]` table, builds every well,
//!   bimolecular product and barrier through the factories, wires the barrier
//!   connectivity and applies the energy reference once.

pub mod load;
