//! Resolves the instance owner behind a request.
//!
//! Every `/api/v1/instances` handler takes an [`AuthUser`]; the owner id
//! scopes store lookups and the username feeds subdomains and workload
//! names. Tokens are issued elsewhere, so this side only verifies them.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use fleet_core::error::CoreError;
use fleet_core::types::UserId;
use jsonwebtoken::errors::ErrorKind;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// The owner a request acts on behalf of.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    /// Owner name segment of subdomains and workload names.
    pub username: String,
}

fn unauthorized(message: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.to_string()))
}

/// Pull the token out of an `Authorization: Bearer <token>` header. The
/// scheme is matched case-insensitively.
fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| unauthorized("Authorization header is not valid ASCII"))?;

    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(unauthorized(
            "Invalid Authorization format. Expected: Bearer <token>",
        )),
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = validate_token(token, &state.config.jwt).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            match e.kind() {
                ErrorKind::ExpiredSignature => unauthorized("Token has expired"),
                _ => unauthorized("Invalid token"),
            }
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
            username: claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::http::Request;

    use super::*;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/instances");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn scheme_is_case_insensitive() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc"))).unwrap(), "abc");
        assert_eq!(bearer_token(&parts(Some("bearer abc"))).unwrap(), "abc");
    }

    #[test]
    fn rejects_missing_or_foreign_schemes() {
        for header in [None, Some("Basic dXNlcjpwYXNz"), Some("Bearer "), Some("abc")] {
            assert_matches!(
                bearer_token(&parts(header)),
                Err(AppError::Core(CoreError::Unauthorized(_)))
            );
        }
    }
}
