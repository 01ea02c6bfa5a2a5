/// Ownership-based authorization
///
/// Authentication answers *who* is calling; this module answers whether
/// that caller may modify a particular resource. The policy is the same for
/// every owned resource:
///
/// 1. **Detail update/delete**: the owning profile or a superuser
/// 2. **List (bulk) update/delete**: never, for anyone
///
/// Reads are decided by the handlers themselves.
///
/// # Example
///
/// ```
/// use dayplan_shared::auth::authorization::{Authorizer, OwnerOnly, Owned};
/// use dayplan_shared::auth::middleware::{AuthMethod, Principal};
/// use uuid::Uuid;
///
/// struct Note { owner: Uuid }
///
/// impl Owned for Note {
///     fn owner_profile_id(&self) -> Uuid { self.owner }
/// }
///
/// let principal = Principal {
///     user_id: Uuid::new_v4(),
///     profile_id: Uuid::new_v4(),
///     email: "owner@example.com".to_string(),
///     is_superuser: false,
///     method: AuthMethod::ApiKey,
///     session_id: None,
/// };
///
/// let mine = Note { owner: principal.profile_id };
/// let theirs = Note { owner: Uuid::new_v4() };
///
/// assert!(OwnerOnly.update_detail(&principal, &mine).is_ok());
/// assert!(OwnerOnly.update_detail(&principal, &theirs).is_err());
/// assert!(Authorizer::<Note>::delete_list(&OwnerOnly, &principal).is_err());
/// ```

use uuid::Uuid;

use super::middleware::Principal;

/// Message returned for bulk updates
pub const NO_BULK_UPDATE: &str = "Sorry, no update by bundle.";

/// Message returned for bulk deletes
pub const NO_BULK_DELETE: &str = "Sorry, no deletes by bundle";

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Operation is never allowed on this resource
    #[error("{0}")]
    Unauthorized(String),

    /// Caller does not own the resource
    #[error("Not authorized to access this resource")]
    Forbidden,
}

/// A resource owned by a profile
pub trait Owned {
    fn owner_profile_id(&self) -> Uuid;
}

/// Per-operation capability checks against resources of type `R`
pub trait Authorizer<R> {
    fn update_detail(&self, principal: &Principal, resource: &R) -> Result<(), AuthzError>;

    fn delete_detail(&self, principal: &Principal, resource: &R) -> Result<(), AuthzError>;

    fn update_list(&self, principal: &Principal) -> Result<(), AuthzError>;

    fn delete_list(&self, principal: &Principal) -> Result<(), AuthzError>;
}

/// Owner-or-superuser policy for any [`Owned`] resource
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerOnly;

impl OwnerOnly {
    /// True when `principal` may act on `resource` as its owner
    pub fn owns<R: Owned>(principal: &Principal, resource: &R) -> bool {
        principal.is_superuser || resource.owner_profile_id() == principal.profile_id
    }

    fn require_owner<R: Owned>(principal: &Principal, resource: &R) -> Result<(), AuthzError> {
        if Self::owns(principal, resource) {
            Ok(())
        } else {
            Err(AuthzError::Forbidden)
        }
    }
}

impl<R: Owned> Authorizer<R> for OwnerOnly {
    fn update_detail(&self, principal: &Principal, resource: &R) -> Result<(), AuthzError> {
        Self::require_owner(principal, resource)
    }

    fn delete_detail(&self, principal: &Principal, resource: &R) -> Result<(), AuthzError> {
        Self::require_owner(principal, resource)
    }

    fn update_list(&self, _principal: &Principal) -> Result<(), AuthzError> {
        Err(AuthzError::Unauthorized(NO_BULK_UPDATE.to_string()))
    }

    fn delete_list(&self, _principal: &Principal) -> Result<(), AuthzError> {
        Err(AuthzError::Unauthorized(NO_BULK_DELETE.to_string()))
    }
}
