//! Bootstrap admin credentials for a provisioned workload.
//!
//! Credentials travel from the API request into the workload's environment
//! and nowhere else: they are not persisted and their `Debug` output is
//! redacted so they cannot leak through logs.

use std::fmt;

use validator::ValidateEmail;

use crate::error::CoreError;

/// Environment variable carrying the admin e-mail into the workload.
pub const ADMIN_EMAIL_ENV: &str = "FLEET_ADMIN_EMAIL";

/// Environment variable carrying the admin password into the workload.
pub const ADMIN_PASSWORD_ENV: &str = "FLEET_ADMIN_PASSWORD";

/// Minimum accepted admin password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Initial admin login for a newly provisioned workload.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    email: String,
    password: String,
}

impl AdminCredentials {
    /// Validate and wrap a set of credentials.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Result<Self, CoreError> {
        let email = email.into();
        let password = password.into();

        if !email.validate_email() {
            return Err(CoreError::Validation("Invalid admin email format".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::Validation(format!(
                "Admin password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        Ok(Self { email, password })
    }

    /// Environment entries handed to the workload's entrypoint.
    pub fn to_env(&self) -> Vec<(String, String)> {
        vec![
            (ADMIN_EMAIL_ENV.to_string(), self.email.clone()),
            (ADMIN_PASSWORD_ENV.to_string(), self.password.clone()),
        ]
    }
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
