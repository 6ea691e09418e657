//! Background jobs for the instance fleet.
//!
//! The retention sweep lives in `fleet-lifecycle` and has no schedule of its
//! own; this crate runs it periodically.

pub mod config;
pub mod retention;
