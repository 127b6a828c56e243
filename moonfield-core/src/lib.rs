//! # Moonfield Core
//!
//! Ambient infrastructure shared by Moonfield crates that do not otherwise
//! depend on each other: currently just the `tracing`-based logging setup.

pub mod logging;
