//! Pure domain logic for the instance fleet.
//!
//! Nothing in this crate performs I/O. Persistence lives in `fleet_db`,
//! container access in `fleet_runtime`, and orchestration in
//! `fleet_lifecycle`.

pub mod credentials;
pub mod error;
pub mod naming;
pub mod retention;
pub mod routing;
pub mod status;
pub mod types;
