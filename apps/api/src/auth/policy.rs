//! Role-based authorization.
//!
//! Each route declares who may call it by taking an `Authorized<P>` argument.
//! The extractor runs before the handler body, so a rejected caller never
//! reaches service code.
//!
//! ```rust,ignore
//! async fn archive_product(
//!     Authorized(identity, ..): Authorized<Management>,
//!     State(state): State<AppState>,
//!     Path(id): Path<String>,
//! ) -> ApiResult<StatusCode> { ... }
//! ```
//!
//! Roles combine with OR semantics: holding any one allowed role suffices.

use axum::{extract::FromRequestParts, http::request::Parts};
use shopdesk_core::{Identity, Role};
use std::marker::PhantomData;

use crate::error::ApiError;

/// A named allow-list of roles.
pub trait RolePolicy: Send + Sync + 'static {
    const NAME: &'static str;
    const ALLOWED: &'static [Role];
}

/// ADMIN only.
pub struct AdminOnly;

/// ADMIN or MANAGER.
pub struct Management;

/// ADMIN, MANAGER or EMPLOYEE.
pub struct Staff;

/// Any authenticated user.
pub struct AnyUser;

impl RolePolicy for AdminOnly {
    const NAME: &'static str = "admin";
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

impl RolePolicy for Management {
    const NAME: &'static str = "management";
    const ALLOWED: &'static [Role] = &[Role::Admin, Role::Manager];
}

impl RolePolicy for Staff {
    const NAME: &'static str = "staff";
    const ALLOWED: &'static [Role] = &[Role::Admin, Role::Manager, Role::Employee];
}

impl RolePolicy for AnyUser {
    const NAME: &'static str = "authenticated";
    const ALLOWED: &'static [Role] = &Role::ALL;
}

/// Extractor proving the caller satisfies `P`.
pub struct Authorized<P: RolePolicy>(pub Identity, pub PhantomData<P>);

/// Checks an optional identity against a policy.
pub fn authorize<P: RolePolicy>(identity: Option<&Identity>) -> Result<Identity, ApiError> {
    let identity = identity.ok_or_else(|| ApiError::forbidden("Authentication required"))?;

    if !identity.has_any_role(P::ALLOWED) {
        tracing::warn!(
            username = %identity.username,
            policy = P::NAME,
            "Access denied"
        );
        return Err(ApiError::forbidden(format!(
            "Requires {} access",
            P::NAME
        )));
    }

    Ok(identity.clone())
}

impl<S, P> FromRequestParts<S> for Authorized<P>
where
    S: Send + Sync,
    P: RolePolicy,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = authorize::<P>(parts.extensions.get::<Identity>())?;
        Ok(Authorized(identity, PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_anonymous_is_forbidden() {
        let err = authorize::<AnyUser>(None).unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }

    #[test]
    fn test_or_semantics() {
        let manager = Identity::new("mia", vec![Role::Customer, Role::Manager]);
        assert!(authorize::<Management>(Some(&manager)).is_ok());
        assert!(authorize::<Staff>(Some(&manager)).is_ok());
        assert!(authorize::<AdminOnly>(Some(&manager)).is_err());
    }

    #[test]
    fn test_customer_only_passes_any_user() {
        let customer = Identity::new("cy", vec![Role::Customer]);
        assert!(authorize::<AnyUser>(Some(&customer)).is_ok());
        assert!(authorize::<Staff>(Some(&customer)).is_err());
    }
}
