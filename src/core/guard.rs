//! Access control guard.
//!
//! A [`RequestContext`] is built once per request from the `Authorization`
//! header. Missing or unusable tokens produce an anonymous context rather than
//! an error; protected operations then reject it through
//! [`RequestContext::require_authenticated`].
//!
//! The only authorization rule is ownership: a caller may touch an account, and
//! anything the account owns, only if it is the account linked to their user.

use crate::{
    config::settings::AuthSettings,
    core::identity::{self, AuthState},
    entities::User,
    errors::{Error, Result},
};
use sea_orm::prelude::*;
use tracing::{debug, warn};

/// Per-request authentication state and the caller's linked account.
#[derive(Debug, Clone)]
pub struct RequestContext {
    auth: AuthState,
    account_id: Option<Uuid>,
}

impl RequestContext {
    /// Context for a request without credentials.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            auth: AuthState::Anonymous,
            account_id: None,
        }
    }

    /// Resolves the context from an `Authorization: Bearer <token>` header value.
    ///
    /// For a valid token the caller's current `User.account` is attached. A
    /// valid token whose user no longer exists is treated as anonymous.
    pub async fn from_authorization(
        db: &DatabaseConnection,
        auth: &AuthSettings,
        header: Option<&str>,
    ) -> Result<Self> {
        let Some(token) = header.and_then(bearer_token) else {
            return Ok(Self::anonymous());
        };

        match identity::verify_token(auth, token) {
            AuthState::Authenticated { user_id, email } => {
                let Some(user) = User::find_by_id(user_id).one(db).await? else {
                    debug!(%user_id, "Token refers to a user that no longer exists");
                    return Ok(Self::anonymous());
                };
                Ok(Self {
                    auth: AuthState::Authenticated { user_id, email },
                    account_id: user.account_id,
                })
            }
            state => Ok(Self {
                auth: state,
                account_id: None,
            }),
        }
    }

    /// The authentication state this context was built with.
    #[must_use]
    pub const fn auth_state(&self) -> &AuthState {
        &self.auth
    }

    /// The caller's linked account, if any.
    #[must_use]
    pub const fn account_id(&self) -> Option<Uuid> {
        self.account_id
    }

    /// Returns the caller's user id.
    ///
    /// Fails with `AuthExpired` for a correctly signed but expired token and
    /// `AuthInvalid` for every other unauthenticated state.
    pub fn require_authenticated(&self) -> Result<Uuid> {
        match &self.auth {
            AuthState::Authenticated { user_id, .. } => Ok(*user_id),
            AuthState::Expired => Err(Error::AuthExpired),
            AuthState::Anonymous => Err(Error::AuthInvalid),
        }
    }

    /// Allows the call only when the caller is `user_id`.
    pub fn require_self(&self, user_id: Uuid) -> Result<()> {
        let caller = self.require_authenticated()?;
        if caller != user_id {
            warn!(%caller, target = %user_id, "Denied access to another user");
            return Err(Error::Forbidden);
        }
        Ok(())
    }

    /// Allows the call only when `target` is the caller's own account.
    pub fn require_account_access(&self, target: Uuid) -> Result<()> {
        let caller = self.require_authenticated()?;
        match self.account_id {
            Some(own) if own == target => Ok(()),
            own => {
                warn!(%caller, ?own, %target, "Denied access to account");
                Err(Error::Forbidden)
            }
        }
    }

    /// The caller's own account id, `Forbidden` when none is linked.
    pub fn own_account(&self) -> Result<Uuid> {
        self.require_authenticated()?;
        self.account_id.ok_or(Error::Forbidden)
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::identity::{issue_token, issue_token_at};
    use crate::test_utils::*;
    use chrono::{TimeDelta, Utc};

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token(""), None);
    }

    #[tokio::test]
    async fn test_missing_header_is_anonymous_not_error() -> Result<()> {
        let db = setup_test_db().await?;
        let ctx = RequestContext::from_authorization(&db, &test_auth_settings(), None).await?;
        assert_eq!(ctx.auth_state(), &AuthState::Anonymous);
        assert!(matches!(ctx.require_authenticated(), Err(Error::AuthInvalid)));

        let ctx =
            RequestContext::from_authorization(&db, &test_auth_settings(), Some("Bearer junk"))
                .await?;
        assert!(matches!(ctx.require_authenticated(), Err(Error::AuthInvalid)));
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_token_is_distinguished() -> Result<()> {
        let db = setup_test_db().await?;
        let auth = test_auth_settings();
        let user = create_test_user(&db, "a@x.com").await?;
        let token = issue_token_at(
            &auth,
            user.id,
            &user.email,
            Utc::now() - TimeDelta::hours(3),
        )?;
        let header = format!("Bearer {token}");

        let ctx = RequestContext::from_authorization(&db, &auth, Some(&header)).await?;
        assert!(matches!(ctx.require_authenticated(), Err(Error::AuthExpired)));
        assert!(matches!(
            ctx.require_account_access(Uuid::new_v4()),
            Err(Error::AuthExpired)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_token_for_deleted_user_is_anonymous() -> Result<()> {
        let db = setup_test_db().await?;
        let auth = test_auth_settings();
        let token = issue_token(&auth, Uuid::new_v4(), "ghost@x.com")?;
        let header = format!("Bearer {token}");

        let ctx = RequestContext::from_authorization(&db, &auth, Some(&header)).await?;
        assert!(matches!(ctx.require_authenticated(), Err(Error::AuthInvalid)));
        Ok(())
    }

    #[tokio::test]
    async fn test_account_access_requires_own_account() -> Result<()> {
        let (db, ctx, aggregate) = setup_with_account("a@x.com").await?;
        assert_eq!(ctx.account_id(), Some(aggregate.id));
        assert!(ctx.require_account_access(aggregate.id).is_ok());
        assert!(matches!(
            ctx.require_account_access(Uuid::new_v4()),
            Err(Error::Forbidden)
        ));

        // Authenticated but without an account
        let loner = create_test_user(&db, "b@x.com").await?;
        let loner_ctx = context_for(&db, &loner).await?;
        assert!(loner_ctx.require_authenticated().is_ok());
        assert!(matches!(
            loner_ctx.require_account_access(aggregate.id),
            Err(Error::Forbidden)
        ));
        assert!(matches!(loner_ctx.own_account(), Err(Error::Forbidden)));
        assert!(matches!(
            loner_ctx.require_self(aggregate.user.unwrap().id),
            Err(Error::Forbidden)
        ));
        Ok(())
    }
}
