//! User entity - A registered person who may own one account.
//!
//! The `account_id` column is the user's half of the user/account back-reference;
//! the account workflows keep it in sync with `accounts.user_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Given name
    pub first_name: String,
    /// Family name
    pub surname: String,
    /// Login email, unique across all users
    #[sea_orm(unique)]
    pub email: String,
    /// Salted bcrypt hash, never the raw password
    #[serde(skip_serializing)]
    pub password: String,
    /// The account owned by this user, if one has been created
    #[serde(rename = "account")]
    pub account_id: Option<Uuid>,
    /// Optimistic concurrency counter
    pub version: i32,
}

/// References to other tables are plain id columns
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
