//! Instance naming engine.
//!
//! Derives every identifier an instance needs from the owner's username and
//! the human-readable instance name:
//!
//! - `slug`          = normalized instance name (`"My Cool DB"` -> `"my-cool-db"`)
//! - `subdomain`     = `{owner}-{slug}.{base_domain}`
//! - `workload_name` = `pb-{owner}-{slug}`
//! - `data_path`     = `{base_path}/{owner}/{slug}-{instance_id}`
//!
//! Derivation is deterministic but not injective: `"My DB"` and `"My-DB"`
//! produce the same slug. Uniqueness is arbitrated by the persistence
//! layer's unique constraints, never by this module. Data paths carry the
//! instance id, so a name freed by deletion never reuses the directory the
//! archived instance still retains.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;
use crate::types::InstanceId;

/// Minimum instance name length (characters).
pub const MIN_NAME_LEN: usize = 3;

/// Maximum instance name length (characters).
pub const MAX_NAME_LEN: usize = 100;

/// Prefix of every workload name managed by this system.
pub const WORKLOAD_NAME_PREFIX: &str = "pb";

static VALID_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 _-]+$").expect("valid regex"));

static VALID_OWNER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid regex"));

static INVALID_SLUG_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9-]+").expect("valid regex"));

static REPEATED_HYPHENS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{2,}").expect("valid regex"));

/// All identifiers derived for a new instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceNames {
    pub slug: String,
    pub subdomain: String,
    pub workload_name: String,
    pub data_path: PathBuf,
}

/// Validate a user-supplied instance name.
///
/// Names must be 3-100 characters of letters, digits, spaces, hyphens and
/// underscores.
pub fn validate_instance_name(name: &str) -> Result<(), CoreError> {
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(CoreError::Validation(format!(
            "Instance name must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters"
        )));
    }
    if !VALID_NAME_RE.is_match(name) {
        return Err(CoreError::Validation(
            "Instance name can only contain letters, numbers, spaces, hyphens, and underscores"
                .into(),
        ));
    }
    Ok(())
}

/// Validate the owner's username as it appears in subdomains and workload
/// names: lower-case alphanumeric words separated by single hyphens.
pub fn validate_owner_name(owner: &str) -> Result<(), CoreError> {
    if VALID_OWNER_RE.is_match(owner) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Owner name '{owner}' is not usable in a hostname"
        )))
    }
}

/// Normalize a name into a URL-safe slug.
///
/// Lower-cases, maps whitespace and underscores to hyphens, strips anything
/// outside `[a-z0-9-]`, collapses hyphen runs and trims hyphens from both
/// ends. Idempotent.
///
/// ```
/// use fleet_core::naming::derive_slug;
///
/// assert_eq!(derive_slug("My Cool DB"), "my-cool-db");
/// assert_eq!(derive_slug("__Hello  World__"), "hello-world");
/// ```
pub fn derive_slug(name: &str) -> String {
    let mapped: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '_' { '-' } else { c })
        .collect();
    let stripped = INVALID_SLUG_CHARS_RE.replace_all(&mapped, "");
    let collapsed = REPEATED_HYPHENS_RE.replace_all(&stripped, "-");
    collapsed.trim_matches('-').to_string()
}

/// `{owner}-{slug}.{base_domain}`
pub fn derive_subdomain(owner: &str, slug: &str, base_domain: &str) -> String {
    format!("{owner}-{slug}.{base_domain}")
}

/// `pb-{owner}-{slug}`
pub fn derive_workload_name(owner: &str, slug: &str) -> String {
    format!("{}{slug}", workload_name_prefix(owner))
}

/// Prefix shared by every workload belonging to `owner`.
///
/// Used to discover orphaned workloads that lost their live row.
pub fn workload_name_prefix(owner: &str) -> String {
    format!("{WORKLOAD_NAME_PREFIX}-{owner}-")
}

/// `{base_path}/{owner}/{slug}-{id}`
pub fn derive_data_path(base_path: &Path, owner: &str, slug: &str, id: InstanceId) -> PathBuf {
    base_path.join(owner).join(format!("{slug}-{id}"))
}

/// Validate `raw_name` and derive every identifier for the new instance `id`.
pub fn derive_names(
    id: InstanceId,
    owner: &str,
    raw_name: &str,
    base_domain: &str,
    base_path: &Path,
) -> Result<InstanceNames, CoreError> {
    validate_owner_name(owner)?;
    validate_instance_name(raw_name)?;

    let slug = derive_slug(raw_name);
    if slug.is_empty() {
        return Err(CoreError::Validation(format!(
            "Instance name '{raw_name}' does not contain any letters or numbers"
        )));
    }

    Ok(InstanceNames {
        subdomain: derive_subdomain(owner, &slug, base_domain),
        workload_name: derive_workload_name(owner, &slug),
        data_path: derive_data_path(base_path, owner, &slug, id),
        slug,
    })
}
