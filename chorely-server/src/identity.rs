//! chorely-server/src/identity.rs
//!
//! Caller identity as forwarded by the upstream identity provider.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use chorely_core::Error;
use chorely_core::models::Role;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden("admin only".to_string()).into())
        }
    }

    /// Members may only act on their own account; admins on anyone's.
    pub fn require_self_or_admin(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.is_admin() || self.user_id == user_id {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("cannot act on behalf of user {}", user_id)).into())
        }
    }

    /// Strictly the caller's own account, admins included.
    pub fn require_self(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.user_id == user_id {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("cannot act on behalf of user {}", user_id)).into())
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, Error> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| Error::Forbidden(format!("missing {} header", name)))?
        .to_str()
        .map_err(|_| Error::Validation(format!("malformed {} header", name)))
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = Uuid::parse_str(header(parts, USER_ID_HEADER)?.trim()).map_err(Error::from)?;
        let role = header(parts, USER_ROLE_HEADER)?.trim().to_ascii_lowercase().parse::<Role>()?;
        Ok(Caller { user_id, role })
    }
}
