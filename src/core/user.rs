//! User business logic - Profile reads, self-service edits and account closure.
//!
//! Users may only edit or delete themselves. Deleting a user removes their
//! account and everything it owns in the same transaction.

use crate::{
    config::settings::AuthSettings,
    core::{
        account::{AccountDeletion, cascade_delete_account, load_account},
        guard::RequestContext,
        identity::hash_password,
        validation::validate_text,
    },
    entities::{User, user},
    errors::{EntityKind, Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Fields a user may change on themselves.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChanges {
    /// New given name
    pub first_name: Option<String>,
    /// New family name
    pub surname: Option<String>,
    /// New login email; must stay unique
    pub email: Option<String>,
    /// New raw password; stored hashed
    pub password: Option<String>,
}

impl UserChanges {
    /// True when no field was supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.surname.is_none()
            && self.email.is_none()
            && self.password.is_none()
    }
}

/// What a user delete removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeletion {
    /// The deleted user
    pub user_id: Uuid,
    /// The cascaded account delete, if the user had an account
    pub account: Option<AccountDeletion>,
}

async fn load_user<C>(conn: &C, user_id: Uuid) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found(EntityKind::User, user_id))
}

/// Looks up a user by id. Requires an authenticated caller.
pub async fn find_user(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    user_id: Uuid,
) -> Result<user::Model> {
    ctx.require_authenticated()?;
    load_user(db, user_id).await
}

/// Lists every registered user by surname.
pub async fn list_users(db: &DatabaseConnection, ctx: &RequestContext) -> Result<Vec<user::Model>> {
    ctx.require_authenticated()?;
    let users = User::find()
        .order_by_asc(user::Column::Surname)
        .order_by_asc(user::Column::FirstName)
        .all(db)
        .await?;
    if users.is_empty() {
        return Err(Error::CollectionEmpty {
            entity: EntityKind::User,
            scope: None,
        });
    }
    Ok(users)
}

/// The user the session token belongs to.
pub async fn current_user(db: &DatabaseConnection, ctx: &RequestContext) -> Result<user::Model> {
    let user_id = ctx.require_authenticated()?;
    load_user(db, user_id).await
}

/// Applies the supplied profile fields to the caller's own user.
#[instrument(skip(db, auth, ctx, changes))]
pub async fn edit_user(
    db: &DatabaseConnection,
    auth: &AuthSettings,
    ctx: &RequestContext,
    user_id: Uuid,
    changes: UserChanges,
) -> Result<user::Model> {
    ctx.require_self(user_id)?;
    if changes.is_empty() {
        return Err(Error::NoFieldsProvided {
            entity: EntityKind::User,
        });
    }

    let current = load_user(db, user_id).await?;
    let mut update = user::ActiveModel {
        version: Set(current.version + 1),
        ..Default::default()
    };
    if let Some(first_name) = changes.first_name {
        update.first_name = Set(first_name);
    }
    if let Some(surname) = changes.surname {
        update.surname = Set(surname);
    }
    let mut email_key = current.email.clone();
    if let Some(email) = changes.email {
        validate_text("email", &email)?;
        if email != current.email {
            let taken = User::find()
                .filter(user::Column::Email.eq(email.as_str()))
                .one(db)
                .await?;
            if taken.is_some() {
                return Err(Error::Exists {
                    entity: EntityKind::User,
                    key: email,
                });
            }
        }
        email_key.clone_from(&email);
        update.email = Set(email);
    }
    if let Some(password) = changes.password {
        validate_text("password", &password)?;
        update.password = Set(hash_password(auth, &password).await?);
    }

    let result = User::update_many()
        .set(update)
        .filter(user::Column::Id.eq(current.id))
        .filter(user::Column::Version.eq(current.version))
        .exec(db)
        .await
        .map_err(|e| Error::from_write(EntityKind::User, &email_key, e))?;
    if result.rows_affected == 0 {
        return Err(Error::UpdateFailed {
            entity: EntityKind::User,
        });
    }

    debug!(%user_id, "Updated user");
    load_user(db, user_id).await
}

/// Deletes the caller's own user, cascading through their account.
#[instrument(skip(db, ctx))]
pub async fn delete_user(
    db: &DatabaseConnection,
    ctx: &RequestContext,
    user_id: Uuid,
) -> Result<UserDeletion> {
    ctx.require_self(user_id)?;

    let txn = db.begin().await?;
    let current = load_user(&txn, user_id).await?;

    let account = match current.account_id {
        Some(account_id) => {
            let owned = load_account(&txn, account_id).await?;
            Some(cascade_delete_account(&txn, &owned, false).await?)
        }
        None => None,
    };

    let result = User::delete_many()
        .filter(user::Column::Id.eq(current.id))
        .filter(user::Column::Version.eq(current.version))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::DeleteFailed {
            entity: EntityKind::User,
        });
    }
    txn.commit().await?;

    info!(%user_id, had_account = account.is_some(), "Deleted user");
    Ok(UserDeletion { user_id, account })
}
