//! Request-scoped identity passed into the storage layer.

use crate::error::AppError;

/// Identity of the caller of a storage operation.
///
/// Produced by an authentication collaborator (cookie or token based) before
/// the storage layer is called. The storage layer treats the user id as an
/// opaque string; operations that need it return [`AppError::MissingUser`]
/// when it is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    user_id: Option<String>,
}

impl RequestContext {
    /// Context bound to `user_id`. An empty id is treated as absent.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            user_id: (!user_id.is_empty()).then_some(user_id),
        }
    }

    /// Context without an identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Returns the bound user id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::MissingUser`] if no identity is bound.
    pub fn user_id(&self) -> Result<&str, AppError> {
        self.user_id.as_deref().ok_or(AppError::MissingUser)
    }
}
