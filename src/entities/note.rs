//! Note entity - Free-text reminders attached to an account.
//!
//! `(body, account_id)` is unique.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Note database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notes")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the note
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owning account
    #[sea_orm(indexed)]
    #[serde(rename = "account")]
    pub account_id: Uuid,
    /// Note text
    pub body: String,
    /// When the note was created
    pub created_at: DateTimeUtc,
    /// When the note was last modified
    pub updated_at: DateTimeUtc,
    /// Optimistic concurrency counter
    pub version: i32,
}

/// References to other tables are plain id columns
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
