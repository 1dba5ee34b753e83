//! Identity and credential store.
//!
//! Registers users with a bcrypt password hash, checks credentials at login and
//! issues HS256 session tokens carrying `{userId, email, iat, exp}`. Token
//! verification never fails: a bad token simply yields an anonymous state, and
//! it is up to the guard to reject anonymous callers of protected operations.

use crate::{
    config::settings::AuthSettings,
    core::validation::validate_text,
    entities::{User, user},
    errors::{EntityKind, Error, Result},
};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use sea_orm::{Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Registration input
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// Given name
    pub first_name: String,
    /// Family name
    pub surname: String,
    /// Login email
    pub email: String,
    /// Raw password; hashed before it is stored
    pub password: String,
}

/// Successful login result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    /// The authenticated user
    pub user: user::Model,
    /// Signed session token
    pub token: String,
    /// Token lifetime in hours
    pub token_expiration: i64,
}

/// Authentication state derived from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No token, or a token that is malformed or wrongly signed
    Anonymous,
    /// A correctly signed token past its expiry
    Expired,
    /// A valid token
    Authenticated {
        /// Id of the token's user
        user_id: Uuid,
        /// Email embedded in the token
        email: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    user_id: Uuid,
    email: String,
    iat: i64,
    exp: i64,
}

/// Hashes a password with a fresh salt on the blocking pool.
pub async fn hash_password(auth: &AuthSettings, raw: &str) -> Result<String> {
    let raw = raw.to_owned();
    let cost = auth.bcrypt_cost;
    tokio::task::spawn_blocking(move || bcrypt::hash(raw, cost))
        .await?
        .map_err(Into::into)
}

/// Compares a raw password against a stored hash on the blocking pool.
pub async fn verify_password(raw: &str, hash: &str) -> Result<bool> {
    let raw = raw.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(raw, &hash))
        .await?
        .map_err(Into::into)
}

/// Issues a session token valid for the configured lifetime from now.
pub fn issue_token(auth: &AuthSettings, user_id: Uuid, email: &str) -> Result<String> {
    issue_token_at(auth, user_id, email, Utc::now())
}

pub(crate) fn issue_token_at(
    auth: &AuthSettings,
    user_id: Uuid,
    email: &str,
    issued_at: DateTime<Utc>,
) -> Result<String> {
    let lifetime = TimeDelta::try_hours(auth.token_ttl_hours).ok_or_else(|| Error::Config {
        message: format!("token lifetime out of range: {}h", auth.token_ttl_hours),
    })?;
    let claims = Claims {
        user_id,
        email: email.to_string(),
        iat: issued_at.timestamp(),
        exp: (issued_at + lifetime).timestamp(),
    };
    let key = EncodingKey::from_secret(auth.jwt_key.as_bytes());
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key).map_err(Into::into)
}

/// Decodes a session token into an authentication state.
#[must_use]
pub fn verify_token(auth: &AuthSettings, token: &str) -> AuthState {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let key = DecodingKey::from_secret(auth.jwt_key.as_bytes());

    match jsonwebtoken::decode::<Claims>(token, &key, &validation) {
        Ok(data) => AuthState::Authenticated {
            user_id: data.claims.user_id,
            email: data.claims.email,
        },
        Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => AuthState::Expired,
        Err(e) => {
            debug!("Rejected session token: {e}");
            AuthState::Anonymous
        }
    }
}

/// Registers a new user.
///
/// Fails with `Exists` when the email is already registered.
#[instrument(skip(db, auth, new_user), fields(email = %new_user.email))]
pub async fn create_user(
    db: &DatabaseConnection,
    auth: &AuthSettings,
    new_user: NewUser,
) -> Result<user::Model> {
    validate_text("email", &new_user.email)?;
    validate_text("password", &new_user.password)?;

    let existing = User::find()
        .filter(user::Column::Email.eq(new_user.email.as_str()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::Exists {
            entity: EntityKind::User,
            key: new_user.email,
        });
    }

    let password = hash_password(auth, &new_user.password).await?;
    let email = new_user.email.clone();
    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        first_name: Set(new_user.first_name),
        surname: Set(new_user.surname),
        email: Set(new_user.email),
        password: Set(password),
        account_id: Set(None),
        version: Set(0),
    };
    let created = user
        .insert(db)
        .await
        .map_err(|e| Error::from_write(EntityKind::User, &email, e))?;

    info!(user_id = %created.id, "Registered user");
    Ok(created)
}

/// Checks credentials and issues a session token.
#[instrument(skip(db, auth, password))]
pub async fn authenticate(
    db: &DatabaseConnection,
    auth: &AuthSettings,
    email: &str,
    password: &str,
) -> Result<AuthPayload> {
    let user = User::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?
        .ok_or(Error::UserEmailNotFound)?;

    if !verify_password(password, &user.password).await? {
        warn!(user_id = %user.id, "Login rejected: password mismatch");
        return Err(Error::InvalidCredentials);
    }

    let token = issue_token(auth, user.id, &user.email)?;
    debug!(user_id = %user.id, "Issued session token");
    Ok(AuthPayload {
        user,
        token,
        token_expiration: auth.token_ttl_hours,
    })
}

/// Registers a user and logs them straight in.
pub async fn register_and_login(
    db: &DatabaseConnection,
    auth: &AuthSettings,
    new_user: NewUser,
) -> Result<AuthPayload> {
    let password = new_user.password.clone();
    let user = create_user(db, auth, new_user).await?;
    authenticate(db, auth, &user.email, &password).await
}
