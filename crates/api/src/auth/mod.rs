//! Authentication primitives.
//!
//! - [`jwt`] -- HS256 bearer-token validation.

pub mod jwt;
