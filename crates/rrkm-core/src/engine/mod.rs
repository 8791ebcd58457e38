//! # Engine Module
//!
//! Orchestration around the model families: how they are configured, how
//! failures are reported, how keyword blocks become model instances and where
//! the finished species live.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Grid, truncation and solver controls threaded through
//!   every constructor
//! - **Error Handling** ([`error`]) - Construction, logic and numeric failures with diagnostic context
//! - **Factories** ([`factory`]) - Static tables from `type` discriminants to variant constructors
//! - **Registry** ([`registry`]) - Species arena with wells, products and barrier connectivity

pub mod config;
pub mod error;
pub mod factory;
pub mod registry;
