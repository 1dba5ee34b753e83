//! Bill entity - A recurring outgoing owned by an account.
//!
//! `(name, account_id)` is unique, and the name must also not clash with a
//! one-off payment in the same account.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bill database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bills")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the bill
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Owning account
    #[sea_orm(indexed)]
    #[serde(rename = "account")]
    pub account_id: Uuid,
    /// Display name (e.g., "Rent", "Council Tax")
    pub name: String,
    /// Amount due
    pub amount: f64,
    /// Whether this period's bill has been paid
    pub paid: bool,
    /// Optimistic concurrency counter
    pub version: i32,
}

/// References to other tables are plain id columns
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
