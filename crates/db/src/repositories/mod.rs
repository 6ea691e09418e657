//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod archive_repo;
pub mod instance_repo;

pub use archive_repo::ArchiveRepo;
pub use instance_repo::{CreateOutcome, InstanceRepo};
